//! Segmentation: micrograph bytes to grain contours.
//!
//! decode -> grayscale -> Gaussian blur -> threshold window ->
//! external contour tracing -> per-contour simplification.

use crate::blur::gaussian_blur;
use crate::config::SegmentConfig;
use crate::contour::trace_external;
use crate::grayscale::decode_and_grayscale;
use crate::simplify::simplify_contours;
use crate::threshold::{ResolvedWindow, binarize_window};
use crate::types::{Contour, Dimensions, EngineError};

/// Output of [`segment`].
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Source image size.
    pub dimensions: Dimensions,
    /// One outer boundary per foreground region, in tracing order.
    /// May be empty.
    pub contours: Vec<Contour>,
    /// The threshold window actually applied.
    pub window: ResolvedWindow,
}

/// Segment a micrograph into grain contours.
///
/// An image with no foreground produces an empty contour list rather
/// than an error; operations that need contours report that later.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if `config` is out of range.
/// - [`EngineError::InvalidImage`] if the bytes are empty or cannot
///   be decoded.
pub fn segment(image_bytes: &[u8], config: &SegmentConfig) -> Result<Segmentation, EngineError> {
    config.validate()?;

    let gray = decode_and_grayscale(image_bytes)?;
    let dimensions = Dimensions::new(gray.width(), gray.height());

    let blurred = gaussian_blur(&gray, config.blur_kernel_size);
    let window = config.threshold.resolve(&blurred)?;
    let mask = binarize_window(&blurred, window, config.invert);

    let traced = trace_external(&mask);
    let traced_points: usize = traced.iter().map(Contour::len).sum();
    let contours = simplify_contours(&traced, config.simplify_ratio);

    tracing::debug!(
        width = dimensions.width,
        height = dimensions.height,
        min = window.min,
        max = window.max,
        contours = contours.len(),
        traced_points,
        kept_points = contours.iter().map(Contour::len).sum::<usize>(),
        "segmented image"
    );

    Ok(Segmentation {
        dimensions,
        contours,
        window,
    })
}
