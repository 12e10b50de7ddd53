//! Cover image quality gate.
//!
//! Rejects provider placeholders and thumbnails by byte size and decoded
//! dimensions. Anything that fails to decode is rejected.

use std::fs;
use std::path::Path;

use image::{DynamicImage, GenericImageView};
use log::debug;
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

use crate::config::QualityConfig;

/// Minimum size and dimensions a cover must clear. Height uses the same
/// minimum as width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThresholds {
    pub min_dimension_px: u32,
    pub min_size_bytes: u64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_dimension_px: 300,
            min_size_bytes: 20_000,
        }
    }
}

impl From<&QualityConfig> for QualityThresholds {
    fn from(config: &QualityConfig) -> Self {
        Self {
            min_dimension_px: config.min_dimension_px,
            min_size_bytes: config.min_size_bytes,
        }
    }
}

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xff && bytes[1] == 0xd8
}

fn decode_jpeg_non_strict(bytes: &[u8]) -> Option<DynamicImage> {
    if !looks_like_jpeg(bytes) {
        return None;
    }

    let options = DecoderOptions::new_cmd()
        .set_strict_mode(false)
        .jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let pixels = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    let image = image::RgbaImage::from_raw(width as u32, height as u32, pixels)?;
    Some(DynamicImage::ImageRgba8(image))
}

/// Decoded `(width, height)`, trying the strict decoder before the lenient JPEG path.
pub fn image_dimensions_from_bytes(bytes: &[u8]) -> Option<(u32, u32)> {
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_jpeg_non_strict(bytes))
        .map(|decoded| decoded.dimensions())
}

pub fn validate_bytes(bytes: &[u8], thresholds: QualityThresholds) -> bool {
    let size = bytes.len() as u64;
    if size < thresholds.min_size_bytes {
        debug!(
            "Quality gate: rejected {} bytes (< {})",
            size, thresholds.min_size_bytes
        );
        return false;
    }

    let Some((width, height)) = image_dimensions_from_bytes(bytes) else {
        debug!("Quality gate: rejected undecodable image ({size} bytes)");
        return false;
    };
    if width < thresholds.min_dimension_px || height < thresholds.min_dimension_px {
        debug!(
            "Quality gate: rejected {}x{} (< {}px)",
            width, height, thresholds.min_dimension_px
        );
        return false;
    }
    true
}

pub fn validate_file(path: &Path, thresholds: QualityThresholds) -> bool {
    match fs::read(path) {
        Ok(bytes) => validate_bytes(&bytes, thresholds),
        Err(error) => {
            debug!(
                "Quality gate: could not read {}: {}",
                path.display(),
                error
            );
            false
        }
    }
}
