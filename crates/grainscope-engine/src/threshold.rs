//! Intensity thresholding: turn a blurred micrograph into a binary
//! foreground mask.
//!
//! Foreground (grain) pixels are those whose intensity lies inside an
//! inclusive `[min, max]` window. The automatic window starts just above
//! Otsu's level (the level itself is the last background intensity) and
//! ends at the brightest pixel in the image.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::EngineError;

/// Foreground intensity value in binary masks.
pub const FOREGROUND: u8 = 255;

/// How the foreground intensity window is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdWindow {
    /// Just above Otsu's level for `min`, the image maximum for `max`.
    #[default]
    Auto,
    /// Operator-chosen inclusive window.
    Manual {
        /// Lowest intensity counted as foreground.
        min: u8,
        /// Highest intensity counted as foreground.
        max: u8,
    },
}

/// A concrete `[min, max]` window after resolving [`ThresholdWindow::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
    /// Lowest intensity counted as foreground.
    pub min: u8,
    /// Highest intensity counted as foreground.
    pub max: u8,
}

impl ThresholdWindow {
    /// Resolve the window against a (blurred) image.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if a manual window has
    /// `min > max`.
    pub fn resolve(self, image: &GrayImage) -> Result<ResolvedWindow, EngineError> {
        match self {
            Self::Auto => {
                let min = imageproc::contrast::otsu_level(image).saturating_add(1);
                let max = image.pixels().map(|p| p.0[0]).max().unwrap_or(u8::MAX);
                Ok(ResolvedWindow {
                    min,
                    max: max.max(min),
                })
            }
            Self::Manual { min, max } => {
                if min > max {
                    return Err(EngineError::invalid(format!(
                        "threshold window min ({min}) exceeds max ({max})"
                    )));
                }
                Ok(ResolvedWindow { min, max })
            }
        }
    }
}

/// Binarize `image` with an inclusive window.
///
/// When `invert` is set, pixels outside the window become foreground
/// instead, for micrographs where grains are darker than boundaries.
#[must_use = "returns the binary mask"]
pub fn binarize_window(image: &GrayImage, window: ResolvedWindow, invert: bool) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        let inside = (window.min..=window.max).contains(&v);
        if inside == invert {
            image::Luma([0])
        } else {
            image::Luma([FOREGROUND])
        }
    })
}

/// Binarize `image` at a single level: pixels strictly above `level`
/// become foreground.
#[must_use = "returns the binary mask"]
pub fn binarize_above(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > level {
            image::Luma([FOREGROUND])
        } else {
            image::Luma([0])
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_tone() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Luma([40])
            } else {
                image::Luma([200])
            }
        })
    }

    #[test]
    fn auto_window_separates_two_tones() {
        let img = two_tone();
        let window = ThresholdWindow::Auto.resolve(&img).unwrap();
        assert!(window.min > 40 && window.min <= 200, "otsu level {}", window.min);
        assert_eq!(window.max, 200);

        let mask = binarize_window(&img, window, false);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(9, 0).0[0], FOREGROUND);
    }

    #[test]
    fn manual_window_is_inclusive() {
        let img = GrayImage::from_fn(3, 1, |x, _| image::Luma([[10, 20, 30][x as usize]]));
        let window = ThresholdWindow::Manual { min: 10, max: 20 }.resolve(&img).unwrap();
        let mask = binarize_window(&img, window, false);
        let values: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![255, 255, 0]);
    }

    #[test]
    fn inverted_window_flips_foreground() {
        let img = two_tone();
        let window = ResolvedWindow { min: 100, max: 255 };
        let mask = binarize_window(&img, window, true);
        assert_eq!(mask.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(9, 0).0[0], 0);
    }

    #[test]
    fn manual_window_rejects_min_above_max() {
        let img = two_tone();
        let result = ThresholdWindow::Manual { min: 200, max: 100 }.resolve(&img);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn binarize_above_is_strict() {
        let img = GrayImage::from_fn(3, 1, |x, _| image::Luma([[99, 100, 101][x as usize]]));
        let mask = binarize_above(&img, 100);
        let values: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 0, 255]);
    }

    #[test]
    fn window_serializes_with_mode_tag() {
        let json = serde_json::to_string(&ThresholdWindow::Manual { min: 1, max: 2 }).unwrap();
        assert_eq!(json, r#"{"mode":"manual","min":1,"max":2}"#);
        let auto: ThresholdWindow = serde_json::from_str(r#"{"mode":"auto"}"#).unwrap();
        assert_eq!(auto, ThresholdWindow::Auto);
    }
}
