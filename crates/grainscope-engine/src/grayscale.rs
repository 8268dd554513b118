//! Image decoding and grayscale conversion.
//!
//! Accepts raw micrograph bytes (PNG, JPEG, BMP, WebP, TIFF) and produces
//! a single-channel intensity image. Both the segmenter and the phase
//! analyzer start here.

use image::error::{DecodingError, ImageFormatHint};
use image::{GrayImage, ImageError};

use crate::types::EngineError;

/// Decode raw image bytes and convert to grayscale.
///
/// Supports whatever the `image` crate can decode with the enabled
/// features. Color input is reduced with the standard luminance weights.
///
/// # Errors
///
/// Returns [`EngineError::InvalidImage`] if `bytes` is empty, the image
/// format is unrecognized or the data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, EngineError> {
    if bytes.is_empty() {
        return Err(ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Unknown,
            "input is empty",
        ))
        .into());
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma8())
}
