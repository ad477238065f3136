//! JPEG encoding of composited tiles.

use crate::error::{RenderError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Default JPEG quality (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encode an RGB image as JPEG. Quality is clamped to 1..=100.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    encoder
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(|e| RenderError::Encode(format!("Failed to encode JPEG: {}", e)))?;

    let bytes = cursor.into_inner();
    debug!(width = image.width(), height = image.height(), bytes = bytes.len(), "Encoded JPEG");
    Ok(bytes)
}

/// The black placeholder served for tiles without coverage.
pub fn blank_jpeg(size: u32, quality: u8) -> Result<Vec<u8>> {
    encode_jpeg(&RgbImage::new(size, size), quality)
}
