pub mod image;

pub use image::DEFAULT_INSTRUCTIONS;
pub use image::DEFAULT_MODEL;
