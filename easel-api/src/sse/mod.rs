pub mod image;
pub mod lines;

pub(crate) use image::spawn_image_stream;
