//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate, format guessed from content |
//! | Identify | `image::image_dimensions` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeParams, OutputFormat};
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Backend built on the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, BackendError> {
    let file = File::create(path).map_err(BackendError::Io)?;
    Ok(BufWriter::new(file))
}

/// Lossless WebP. The encoder only accepts 8-bit RGB(A), so everything is
/// widened to RGBA first.
fn save_webp(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(create_writer(path)?);
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {}", e)))
}

/// JPEG has no alpha channel; transparent areas flatten to black.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(create_writer(path)?, quality as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

/// Encode and save as AVIF using ravif/rav1e (speed=6 for reasonable throughput).
fn save_avif(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        create_writer(path)?,
        6,
        quality as u8,
    );
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let quality = params.quality.value();
        match params.format {
            OutputFormat::Webp => save_webp(&img, &params.output),
            OutputFormat::Jpeg => save_jpeg(&img, &params.output, quality),
            OutputFormat::Avif => save_avif(&img, &params.output, quality),
        }
    }
}
