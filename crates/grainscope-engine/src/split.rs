//! Cutting a grain polygon along an operator-drawn line.
//!
//! The cutting line is thickened into a thin band (one oriented
//! rectangle per segment, each extended past its endpoints by the band
//! half-width so consecutive rectangles overlap at the joints) and the
//! band is subtracted from the polygon with `geo`'s boolean operations.
//! What is left is one or more polygons; a line that crosses the grain
//! from side to side disconnects it.

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{Area, BooleanOps, LineString, MultiPolygon, Polygon};

use crate::geometry::{AREA_EPSILON, closed_ring, contour_area, distinct_vertex_count};
use crate::types::{EngineError, Point};

/// Half-width of the band subtracted along the cutting line, in pixels.
pub const CUT_HALF_WIDTH: f64 = 0.001;

/// Subtract a thin band around `line` from `polygon`.
///
/// `polygon` is closed automatically if its last vertex differs from the
/// first. Returned polygons are exterior rings without the repeated
/// closing vertex; holes created by a line that never reaches the
/// boundary are dropped, since stored contours carry no holes.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if `line` has fewer than two points,
///   zero total length, or non-finite coordinates.
/// - [`EngineError::EmptyGeometry`] if `polygon` is degenerate (fewer
///   than three distinct vertices or zero area) or the band removes it
///   entirely.
/// - [`EngineError::InternalGeometry`] if the boolean operation fails.
///   The detail is logged, not returned.
pub fn split_by_line(polygon: &[Point], line: &[Point]) -> Result<Vec<Vec<Point>>, EngineError> {
    if line.len() < 2 {
        return Err(EngineError::invalid("cutting line needs at least two points"));
    }
    if !line.iter().chain(polygon).all(|p| p.is_finite()) {
        return Err(EngineError::invalid("coordinates must be finite"));
    }

    let bands: Vec<Polygon<f64>> = line
        .windows(2)
        .filter_map(|w| segment_band(w[0], w[1], CUT_HALF_WIDTH))
        .collect();
    if bands.is_empty() {
        return Err(EngineError::invalid("cutting line has zero length"));
    }

    if distinct_vertex_count(polygon) < 3 || contour_area(polygon) < AREA_EPSILON {
        return Err(EngineError::EmptyGeometry);
    }

    let subject = MultiPolygon::new(vec![to_geo_polygon(&closed_ring(polygon))]);

    let result = catch_unwind(AssertUnwindSafe(|| {
        bands.into_iter().fold(subject, |remaining, band| {
            remaining.difference(&MultiPolygon::new(vec![band]))
        })
    }));

    let remaining = match result {
        Ok(remaining) => remaining,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_owned());
            tracing::error!(%detail, "polygon difference failed");
            return Err(EngineError::InternalGeometry);
        }
    };

    let pieces: Vec<Vec<Point>> = remaining
        .into_iter()
        .filter(|p| p.unsigned_area() > AREA_EPSILON)
        .map(|p| open_exterior(&p))
        .collect();

    if pieces.is_empty() {
        return Err(EngineError::EmptyGeometry);
    }
    tracing::debug!(pieces = pieces.len(), "split polygon");
    Ok(pieces)
}

/// Oriented rectangle around segment `a -> b`, extended by `half_width`
/// past both ends. `None` for zero-length segments.
fn segment_band(a: Point, b: Point, half_width: f64) -> Option<Polygon<f64>> {
    let length = a.distance(b);
    if length <= f64::EPSILON {
        return None;
    }
    let (dx, dy) = ((b.x - a.x) / length, (b.y - a.y) / length);
    let (nx, ny) = (-dy * half_width, dx * half_width);
    let start = Point::new(dx.mul_add(-half_width, a.x), dy.mul_add(-half_width, a.y));
    let end = Point::new(dx.mul_add(half_width, b.x), dy.mul_add(half_width, b.y));

    Some(Polygon::new(
        LineString::from(vec![
            (start.x + nx, start.y + ny),
            (end.x + nx, end.y + ny),
            (end.x - nx, end.y - ny),
            (start.x - nx, start.y - ny),
            (start.x + nx, start.y + ny),
        ]),
        vec![],
    ))
}

fn to_geo_polygon(ring: &[Point]) -> Polygon<f64> {
    let coords: Vec<(f64, f64)> = ring.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(LineString::from(coords), vec![])
}

fn open_exterior(polygon: &Polygon<f64>) -> Vec<Point> {
    let mut points: Vec<Point> = polygon
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    fn horizontal(y: f64) -> Vec<Point> {
        vec![Point::new(-1.0, y), Point::new(11.0, y)]
    }

    #[test]
    fn square_cut_in_half() {
        let pieces = split_by_line(&square(), &horizontal(5.0)).unwrap();
        assert_eq!(pieces.len(), 2);
        let total: f64 = pieces.iter().map(|p| contour_area(p)).sum();
        assert_abs_diff_eq!(total, 100.0, epsilon = 0.05);
        for piece in &pieces {
            assert_abs_diff_eq!(contour_area(piece), 50.0, epsilon = 0.05);
            assert_ne!(piece.first(), piece.last());
        }
    }

    #[test]
    fn already_closed_input_gives_same_result() {
        let mut closed = square();
        closed.push(Point::new(0.0, 0.0));
        let pieces = split_by_line(&closed, &horizontal(5.0)).unwrap();
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn polyline_cut_through_a_corner() {
        // An L-shaped cut from the top edge to the right edge.
        let line = vec![Point::new(3.0, -1.0), Point::new(3.0, 3.0), Point::new(11.0, 3.0)];
        let pieces = split_by_line(&square(), &line).unwrap();
        assert_eq!(pieces.len(), 2);
        let mut areas: Vec<f64> = pieces.iter().map(|p| contour_area(p)).collect();
        areas.sort_by(f64::total_cmp);
        assert_abs_diff_eq!(areas[0], 21.0, epsilon = 0.05);
        assert_abs_diff_eq!(areas[1], 79.0, epsilon = 0.05);
    }

    #[test]
    fn line_missing_the_polygon_leaves_it_whole() {
        let pieces = split_by_line(&square(), &horizontal(20.0)).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_abs_diff_eq!(contour_area(&pieces[0]), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn band_covering_the_polygon_is_empty_geometry() {
        let sliver = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0005),
            Point::new(0.0, 0.0005),
        ];
        let result = split_by_line(&sliver, &horizontal(0.00025));
        assert!(matches!(result, Err(EngineError::EmptyGeometry)));
    }

    #[test]
    fn degenerate_polygon_is_empty_geometry() {
        let flat = vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(10.0, 0.0)];
        assert!(matches!(
            split_by_line(&flat, &horizontal(0.0)),
            Err(EngineError::EmptyGeometry)
        ));
    }

    #[test]
    fn short_or_zero_length_lines_are_rejected() {
        assert!(matches!(
            split_by_line(&square(), &[Point::new(1.0, 1.0)]),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            split_by_line(&square(), &[Point::new(1.0, 1.0), Point::new(1.0, 1.0)]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let line = vec![Point::new(f64::NAN, 0.0), Point::new(1.0, 1.0)];
        assert!(matches!(
            split_by_line(&square(), &line),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
