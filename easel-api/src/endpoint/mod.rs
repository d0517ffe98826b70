pub mod download;
pub mod image;
mod session;
