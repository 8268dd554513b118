//! Polygon primitives shared by the measurer, the contour editor and the
//! chart synthesizer.
//!
//! All functions take vertex slices in image coordinates. Rings are
//! implicitly closed; a trailing copy of the first vertex contributes a
//! zero-length edge and changes nothing.

use crate::types::{Dimensions, Point};

/// Areas below this are treated as zero.
pub const AREA_EPSILON: f64 = 1e-12;

/// Signed shoelace area. Positive for counter-clockwise rings in a
/// y-up frame (clockwise on screen, where y grows downward).
#[must_use]
pub fn signed_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let cross_sum: f64 = edges(polygon).map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y))).sum();
    cross_sum / 2.0
}

/// Absolute planar area via the shoelace formula.
#[must_use]
pub fn contour_area(polygon: &[Point]) -> f64 {
    signed_area(polygon).abs()
}

/// Total edge length. When `closed`, the edge from the last vertex back
/// to the first is included.
#[must_use]
pub fn contour_perimeter(polygon: &[Point], closed: bool) -> f64 {
    let open: f64 = polygon.windows(2).map(|w| w[0].distance(w[1])).sum();
    match (closed, polygon.first(), polygon.last()) {
        (true, Some(&first), Some(&last)) if polygon.len() > 1 => open + last.distance(first),
        _ => open,
    }
}

/// Area-weighted centroid from the shoelace decomposition.
///
/// Returns `None` for degenerate rings (fewer than three vertices or
/// zero area), where the formula would divide by zero.
#[must_use]
pub fn polygon_centroid(polygon: &[Point]) -> Option<Point> {
    let area = signed_area(polygon);
    if area.abs() < AREA_EPSILON {
        return None;
    }

    let (mut cx, mut cy) = (0.0, 0.0);
    for (a, b) in edges(polygon) {
        let cross = a.x.mul_add(b.y, -(b.x * a.y));
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    let scale = 1.0 / (6.0 * area);
    let centroid = Point::new(cx * scale, cy * scale);
    centroid.is_finite().then_some(centroid)
}

/// Returns `true` if `point` lies inside `[0, width] × [0, height]`.
#[must_use]
pub fn point_in_bounds(point: Point, bounds: Dimensions) -> bool {
    (0.0..=f64::from(bounds.width)).contains(&point.x)
        && (0.0..=f64::from(bounds.height)).contains(&point.y)
}

/// Returns `true` if every vertex of `polygon` lies inside the image.
#[must_use]
pub fn polygon_in_bounds(polygon: &[Point], bounds: Dimensions) -> bool {
    polygon.iter().all(|&p| point_in_bounds(p, bounds))
}

/// Number of distinct vertices.
#[must_use]
pub fn distinct_vertex_count(polygon: &[Point]) -> usize {
    let mut seen: Vec<Point> = Vec::with_capacity(polygon.len());
    for &p in polygon {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }
    seen.len()
}

/// Close a ring explicitly by appending its first vertex, unless it is
/// already closed.
#[must_use]
pub fn closed_ring(polygon: &[Point]) -> Vec<Point> {
    let mut ring = polygon.to_vec();
    if let (Some(&first), Some(&last)) = (polygon.first(), polygon.last())
        && first != last
    {
        ring.push(first);
    }
    ring
}

/// Iterate over the ring's edges, including the closing edge.
fn edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn square(side: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ]
    }

    #[test]
    fn square_area_and_perimeter() {
        let sq = square(10.0);
        assert_relative_eq!(contour_area(&sq), 100.0);
        assert_relative_eq!(contour_perimeter(&sq, true), 40.0);
        assert_relative_eq!(contour_perimeter(&sq, false), 30.0);
    }

    #[test]
    fn orientation_flips_sign_only() {
        let sq = square(4.0);
        let mut reversed = sq.clone();
        reversed.reverse();
        assert_relative_eq!(signed_area(&sq), -signed_area(&reversed));
        assert_relative_eq!(contour_area(&sq), contour_area(&reversed));
    }

    #[test]
    fn explicitly_closed_ring_has_same_area() {
        let sq = square(3.0);
        assert_relative_eq!(contour_area(&closed_ring(&sq)), contour_area(&sq));
        assert_relative_eq!(
            contour_perimeter(&closed_ring(&sq), true),
            contour_perimeter(&sq, true)
        );
    }

    #[test]
    fn centroid_of_offset_rectangle() {
        let rect = vec![
            Point::new(2.0, 4.0),
            Point::new(8.0, 4.0),
            Point::new(8.0, 6.0),
            Point::new(2.0, 6.0),
        ];
        let c = polygon_centroid(&rect).unwrap();
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(c.y, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn centroid_is_area_weighted_not_vertex_mean() {
        // L-shape: vertex mean differs from the true centroid.
        let l_shape = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let c = polygon_centroid(&l_shape).unwrap();
        // Two 4x1 / 1x3 rectangles: (2, 0.5) weight 4, (0.5, 2.5) weight 3.
        assert_relative_eq!(c.x, (2.0 * 4.0 + 0.5 * 3.0) / 7.0, epsilon = 1e-12);
        assert_relative_eq!(c.y, (0.5 * 4.0 + 2.5 * 3.0) / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_polygons_have_no_centroid() {
        let collinear = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)];
        assert!(polygon_centroid(&collinear).is_none());
        assert!(polygon_centroid(&[Point::new(1.0, 1.0)]).is_none());
        assert!(polygon_centroid(&[]).is_none());
    }

    #[test]
    fn bounds_checks_are_inclusive() {
        let dims = Dimensions::new(10, 5);
        assert!(point_in_bounds(Point::new(10.0, 5.0), dims));
        assert!(point_in_bounds(Point::new(0.0, 0.0), dims));
        assert!(!point_in_bounds(Point::new(-0.1, 2.0), dims));
        assert!(!polygon_in_bounds(&square(6.0), dims));
        assert!(polygon_in_bounds(&square(5.0), dims));
    }

    #[test]
    fn distinct_vertices_ignore_repeats() {
        let mut pts = square(1.0);
        pts.push(Point::new(0.0, 0.0));
        assert_eq!(distinct_vertex_count(&pts), 4);
    }
}
