//! Closed-contour simplification using Ramer-Douglas-Peucker.
//!
//! Border following emits every boundary pixel. Grain outlines are
//! reduced to their corners with a tolerance proportional to each
//! contour's own perimeter, so large and small grains keep comparable
//! shape fidelity.
//!
//! The ring is split at its first vertex and the vertex farthest from
//! it; each half is simplified as an open chain and the halves are
//! rejoined.

use crate::geometry::contour_perimeter;
use crate::types::{Contour, Point};

/// Default tolerance as a fraction of the contour perimeter.
pub const DEFAULT_SIMPLIFY_RATIO: f64 = 0.005;

/// Simplify a closed contour with `tolerance = ratio * perimeter`.
///
/// A ratio of 0.0 (or less) preserves all vertices. Contours with fewer
/// than 4 vertices are returned unchanged.
#[must_use = "returns the simplified contour"]
pub fn simplify_closed(contour: &Contour, ratio: f64) -> Contour {
    let pixels = contour.points();
    if pixels.len() < 4 || ratio <= 0.0 {
        return contour.clone();
    }

    let points = contour.to_points();
    let tolerance = ratio * contour_perimeter(&points, true);

    let far = farthest_from(&points, 0);
    if far == 0 {
        return contour.clone();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[far] = true;
    rdp_recurse(&points, 0, far, tolerance, &mut kept);

    // Second half wraps around back to the first vertex.
    let mut ring: Vec<Point> = points[far..].to_vec();
    ring.push(points[0]);
    let mut ring_kept = vec![false; ring.len()];
    rdp_recurse(&ring, 0, ring.len() - 1, tolerance, &mut ring_kept);
    for (offset, keep) in ring_kept.iter().enumerate().take(ring.len() - 1) {
        if *keep {
            kept[far + offset] = true;
        }
    }

    pixels
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Simplify every contour independently.
#[must_use = "returns the simplified contours"]
pub fn simplify_contours(contours: &[Contour], ratio: f64) -> Vec<Contour> {
    contours.iter().map(|c| simplify_closed(c, ratio)).collect()
}

fn farthest_from(points: &[Point], origin: usize) -> usize {
    let anchor = points[origin];
    let mut best = origin;
    let mut best_dist = 0.0;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance_squared(anchor);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
