//! The drawing-surface collaborator and a raster implementation of it.

use crate::history::Snapshot;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use image::Rgba;
use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;
use std::io::Cursor;
use thiserror::Error;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to decode base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("snapshot is {actual:?}, surface is {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Where an added image lands on the surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Scales `image` down (never up) so it fits within `max_fraction` of the
/// surface in both dimensions, then centres it.
pub fn place_centered(surface: (u32, u32), image: (u32, u32), max_fraction: f64) -> Placement {
    let (surface_w, surface_h) = (f64::from(surface.0), f64::from(surface.1));
    let (image_w, image_h) = (f64::from(image.0.max(1)), f64::from(image.1.max(1)));
    let max_w = surface_w * max_fraction;
    let max_h = surface_h * max_fraction;

    let scale = if image_w > max_w || image_h > max_h {
        (max_w / image_w).min(max_h / image_h)
    } else {
        1.0
    };

    let width = (image_w * scale).round().max(1.0);
    let height = (image_h * scale).round().max(1.0);
    Placement {
        x: ((surface_w - width) / 2.0).round() as i64,
        y: ((surface_h - height) / 2.0).round() as i64,
        width: width as u32,
        height: height as u32,
    }
}

/// Retained drawing state that can be captured into, and restored from, a
/// [`Snapshot`].
pub trait DrawingSurface: Send + Sync {
    /// Captures the entire surface state.
    fn serialize(&self) -> Result<Snapshot, SurfaceError>;

    /// Replaces the surface state with `snapshot` and repaints.
    fn load(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError>;

    /// Current size in pixels, `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    /// Renders the surface as a `data:image/png;base64,` URI.
    fn export_data_uri(&self) -> Result<String, SurfaceError>;

    /// Decodes `encoded` (PNG, JPEG or WebP) and draws it centred, scaled
    /// down to at most `max_fraction` of the surface. Returns where it landed.
    fn add_image_centered(
        &mut self,
        encoded: &[u8],
        max_fraction: f64,
    ) -> Result<Placement, SurfaceError>;

    /// Wipes everything back to the background.
    fn clear(&mut self);
}

/// An in-memory RGBA canvas on a white background.
///
/// Snapshots are PNG data URIs of the pixels, so serialization is lossless
/// and a loaded snapshot serializes back to the same string.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, WHITE),
        }
    }

    /// Opens an encoded image as the starting canvas.
    pub fn from_encoded(encoded: &[u8]) -> Result<Self, SurfaceError> {
        let pixels = image::load_from_memory(encoded)?.to_rgba8();
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn to_png(&self) -> Result<Vec<u8>, SurfaceError> {
        let mut out = Cursor::new(Vec::new());
        self.pixels.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

impl DrawingSurface for RasterSurface {
    fn serialize(&self) -> Result<Snapshot, SurfaceError> {
        self.export_data_uri().map(Snapshot::from)
    }

    fn load(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let (_, bytes) = decode_data_uri(snapshot.as_str())?;
        let pixels = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?.to_rgba8();
        if pixels.dimensions() != self.pixels.dimensions() {
            return Err(SurfaceError::SizeMismatch {
                expected: self.pixels.dimensions(),
                actual: pixels.dimensions(),
            });
        }
        self.pixels = pixels;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn export_data_uri(&self) -> Result<String, SurfaceError> {
        Ok(format!(
            "{PNG_DATA_URI_PREFIX}{}",
            STANDARD.encode(self.to_png()?)
        ))
    }

    fn add_image_centered(
        &mut self,
        encoded: &[u8],
        max_fraction: f64,
    ) -> Result<Placement, SurfaceError> {
        let image = image::load_from_memory(encoded)?.to_rgba8();
        let placement = place_centered(self.dimensions(), image.dimensions(), max_fraction);
        let image = if (placement.width, placement.height) == image.dimensions() {
            image
        } else {
            imageops::resize(&image, placement.width, placement.height, FilterType::Triangle)
        };
        imageops::overlay(&mut self.pixels, &image, placement.x, placement.y);
        Ok(placement)
    }

    fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = WHITE;
        }
    }
}

/// Splits a `data:<mime>;base64,<payload>` URI into its media type and
/// decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), SurfaceError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| SurfaceError::InvalidDataUri("missing `data:` scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| SurfaceError::InvalidDataUri("missing `,` separator".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| SurfaceError::InvalidDataUri("payload is not base64".to_string()))?;
    Ok((mime.to_string(), STANDARD.decode(payload.trim())?))
}
