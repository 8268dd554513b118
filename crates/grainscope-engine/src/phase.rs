//! Two-phase area fractions from a single intensity threshold.

use crate::grayscale::decode_and_grayscale;
use crate::render::encode_png_gray;
use crate::threshold::{FOREGROUND, binarize_above};
use crate::types::EngineError;

/// Area split between the bright and dark phases.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseAnalysis {
    /// The level the image was split at.
    pub threshold: u8,
    /// Percentage of pixels strictly above the threshold.
    pub phase_1_percent: f64,
    /// `100 - phase_1_percent`.
    pub phase_2_percent: f64,
    /// PNG of the binary mask, phase 1 white.
    pub preview_png: Vec<u8>,
}

/// Threshold `image_bytes` at `threshold` and report the phase split.
///
/// The threshold is validated before the image is decoded.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if `threshold` is outside `[0, 255]`.
/// - [`EngineError::InvalidImage`] if the bytes are empty or cannot
///   be decoded.
/// - [`EngineError::Encode`] if the preview cannot be encoded.
pub fn analyze(image_bytes: &[u8], threshold: i64) -> Result<PhaseAnalysis, EngineError> {
    let threshold = u8::try_from(threshold).map_err(|_| {
        EngineError::invalid(format!("threshold must be between 0 and 255, got {threshold}"))
    })?;

    let gray = decode_and_grayscale(image_bytes)?;
    let mask = binarize_above(&gray, threshold);

    let total = u64::from(mask.width()) * u64::from(mask.height());
    let foreground = mask.pixels().filter(|p| p.0[0] == FOREGROUND).count();
    #[allow(clippy::cast_precision_loss)]
    let phase_1_percent = if total == 0 {
        0.0
    } else {
        foreground as f64 / total as f64 * 100.0
    };

    let preview_png = encode_png_gray(&mask)?;
    tracing::debug!(threshold, phase_1_percent, "phase analysis");

    Ok(PhaseAnalysis {
        threshold,
        phase_1_percent,
        phase_2_percent: 100.0 - phase_1_percent,
        preview_png,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;
    use image::GrayImage;
    use proptest::prelude::*;

    use super::*;

    fn quarter_bright() -> Vec<u8> {
        let img = GrayImage::from_fn(20, 20, |x, y| {
            if x < 10 && y < 10 {
                image::Luma([220])
            } else {
                image::Luma([30])
            }
        });
        encode_png_gray(&img).unwrap()
    }

    #[test]
    fn quarter_of_the_field_is_phase_one() {
        let result = analyze(&quarter_bright(), 128).unwrap();
        assert_relative_eq!(result.phase_1_percent, 25.0);
        assert_relative_eq!(result.phase_2_percent, 75.0);
        assert_eq!(result.threshold, 128);

        let preview = decode_and_grayscale(&result.preview_png).unwrap();
        assert_eq!(preview.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(preview.get_pixel(19, 19).0[0], 0);
    }

    #[test]
    fn threshold_equal_to_pixel_is_background() {
        let result = analyze(&quarter_bright(), 220).unwrap();
        assert_relative_eq!(result.phase_1_percent, 0.0);
        assert_relative_eq!(result.phase_2_percent, 100.0);
    }

    #[test]
    fn out_of_range_threshold_checked_before_decode() {
        for bad in [-1, 256] {
            assert!(matches!(analyze(&[], bad), Err(EngineError::InvalidInput(_))));
        }
    }

    #[test]
    fn undecodable_image() {
        assert!(matches!(analyze(b"not an image", 10), Err(EngineError::InvalidImage(_))));
    }

    proptest! {
        #[test]
        fn phases_are_exact_complements(
            pixels in proptest::collection::vec(any::<u8>(), 1..400),
            threshold in 0i64..=255,
        ) {
            let width = u32::try_from(pixels.len()).unwrap();
            let img = GrayImage::from_raw(width, 1, pixels).unwrap();
            let png = encode_png_gray(&img).unwrap();
            let result = analyze(&png, threshold).unwrap();
            prop_assert_eq!(result.phase_1_percent + result.phase_2_percent, 100.0);
        }
    }
}
