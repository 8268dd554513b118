//! Manual contour correction.
//!
//! Splitting returns new contours and leaves stored state alone; the
//! caller decides whether to splice them into the sample with
//! [`SampleResults::replace_contour`](crate::document::SampleResults::replace_contour)
//! or to discard them.

use crate::split::split_by_line;
use crate::types::{Contour, EngineError, PixelPoint, Point};

/// Split `contour` along `line` and round the pieces to pixel vertices.
///
/// Pieces that collapse to fewer than three vertices after rounding are
/// dropped.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if `line` is unusable.
/// - [`EngineError::EmptyGeometry`] if nothing is left of the contour.
/// - [`EngineError::InternalGeometry`] if the polygon operation fails.
pub fn split_contour(contour: &Contour, line: &[Point]) -> Result<Vec<Contour>, EngineError> {
    let pieces = split_by_line(&contour.to_points(), line)?;

    let contours: Vec<Contour> = pieces
        .into_iter()
        .filter_map(|piece| {
            let mut pixels: Vec<PixelPoint> = piece.into_iter().map(PixelPoint::round).collect();
            pixels.dedup();
            while pixels.len() > 1 && pixels.first() == pixels.last() {
                pixels.pop();
            }
            (pixels.len() >= 3).then(|| Contour::new(pixels))
        })
        .collect();

    if contours.is_empty() {
        return Err(EngineError::EmptyGeometry);
    }
    tracing::info!(pieces = contours.len(), "split contour");
    Ok(contours)
}
