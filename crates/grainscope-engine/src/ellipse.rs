//! Least-squares ellipse fitting for grain orientation.
//!
//! Direct least-squares fit of Fitzgibbon, Pilu and Fisher (1999): the
//! conic `A x² + B xy + C y² + D x + E y + F = 0` minimizing the algebraic
//! residual subject to `4AC - B² = 1`. The constraint makes every result
//! an ellipse, so any five or more non-collinear vertices yield a fit,
//! including concave and rectangular grains.
//!
//! Points are normalized first (centered on the vertex mean, scaled so
//! the mean radius is √2). The generalized eigenproblem
//! `M a = λ C₁ a` is solved by whitening with the Cholesky factor of `M`,
//! which turns it into a symmetric eigenproblem.

use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::distinct_vertex_count;
use crate::types::Point;

/// Minimum number of distinct vertices for a fit.
pub const MIN_FIT_POINTS: usize = 5;

/// Relative ridge added to `M` so that exact fits (points lying on a
/// conic) stay positive definite.
const RIDGE: f64 = 1e-10;

/// A fitted ellipse in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Center in pixels.
    pub center: Point,
    /// Full length of the major axis in pixels.
    pub major_axis: f64,
    /// Full length of the minor axis in pixels.
    pub minor_axis: f64,
    /// Major-axis direction in degrees from +x towards +y, in `[0, 180)`.
    pub angle_deg: f64,
}

/// Fit an ellipse to `points`.
///
/// Returns `None` with fewer than [`MIN_FIT_POINTS`] distinct points or
/// when all points are collinear.
#[must_use]
pub fn fit_ellipse(points: &[Point]) -> Option<Ellipse> {
    if distinct_vertex_count(points) < MIN_FIT_POINTS {
        return None;
    }

    let (mean, scale) = normalization(points);

    let mut design = DMatrix::<f64>::zeros(points.len(), 6);
    for (i, p) in points.iter().enumerate() {
        let x = (p.x - mean.x) * scale;
        let y = (p.y - mean.y) * scale;
        design[(i, 0)] = x * x;
        design[(i, 1)] = x * y;
        design[(i, 2)] = y * y;
        design[(i, 3)] = x;
        design[(i, 4)] = y;
        design[(i, 5)] = 1.0;
    }

    // Scatter matrix split into quadratic and linear blocks.
    let scatter = design.transpose() * &design;
    let s11: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22: Matrix3<f64> = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // Rank deficient exactly when the points are collinear.
    let spread = s22.symmetric_eigen().eigenvalues;
    if spread.min() <= spread.max() * 1e-12 {
        return None;
    }
    let s22_inv = s22.try_inverse()?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();
    let quadratic = constrained_quadratic(&reduced)?;
    let linear = -(s22_inv * s12.transpose() * quadratic);

    let normalized = conic_to_ellipse([
        quadratic[0],
        quadratic[1],
        quadratic[2],
        linear[0],
        linear[1],
        linear[2],
    ])?;

    Some(Ellipse {
        center: Point::new(
            normalized.center.x / scale + mean.x,
            normalized.center.y / scale + mean.y,
        ),
        major_axis: normalized.major_axis / scale,
        minor_axis: normalized.minor_axis / scale,
        angle_deg: normalized.angle_deg,
    })
}

/// Quadratic coefficients `[A, B, C]` minimizing `aᵀ M a` subject to
/// `aᵀ C₁ a = 1`, where `C₁` encodes `4AC - B²`.
///
/// With `M = L Lᵀ` and `a = L⁻ᵀ b`, the problem becomes the symmetric
/// eigenproblem `L⁻¹ C₁ L⁻ᵀ b = (1/λ) b`; the smallest positive `λ` is
/// the largest eigenvalue.
fn constrained_quadratic(reduced: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let constraint = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);

    let ridge = RIDGE * reduced.trace().abs().max(f64::MIN_POSITIVE);
    let regularized = (reduced + reduced.transpose()) * 0.5 + Matrix3::identity() * ridge;
    let l_inv = regularized.cholesky()?.l().try_inverse()?;

    let whitened = l_inv * constraint * l_inv.transpose();
    let eigen = whitened.symmetric_eigen();
    let (best, &mu) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if !(mu > 0.0 && mu.is_finite()) {
        return None;
    }
    Some(l_inv.transpose() * eigen.eigenvectors.column(best))
}

/// Vertex mean and the factor that brings the mean radius to √2.
fn normalization(points: &[Point]) -> (Point, f64) {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let mean = Point::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    );
    let mean_dist = points.iter().map(|p| p.distance(mean)).sum::<f64>() / n;
    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mean, scale)
}

/// Convert `[A, B, C, D, E, F]` of `A x² + B xy + C y² + D x + E y + F = 0`
/// to geometric form.
fn conic_to_ellipse(coeffs: [f64; 6]) -> Option<Ellipse> {
    // The equation is scale invariant; make the quadratic part positive.
    let [a, b, c, d, e, f] = if coeffs[0] + coeffs[2] < 0.0 {
        coeffs.map(|k| -k)
    } else {
        coeffs
    };

    let denom = 4.0 * a * c - b * b;
    if denom <= 1e-12 * (a * a + b * b + c * c) {
        return None;
    }

    // Center: gradient of the quadratic form vanishes.
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    // Conic value at the center.
    let f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;

    // Eigenvalues of [[A, B/2], [B/2, C]], lambda_hi >= lambda_lo.
    let sum = a + c;
    let diff = (a - c).hypot(b);
    let lambda_hi = (sum + diff) / 2.0;
    let lambda_lo = (sum - diff) / 2.0;

    let semi_minor_sq = -f_center / lambda_hi;
    let semi_major_sq = -f_center / lambda_lo;
    if !(semi_minor_sq > 0.0 && semi_major_sq > 0.0) {
        return None;
    }

    // 0.5 * atan2(B, A - C) points along lambda_hi (the minor axis);
    // the major axis is perpendicular.
    let minor_dir = 0.5 * b.atan2(a - c);
    let angle_deg = (minor_dir.to_degrees() + 90.0).rem_euclid(180.0);

    let ellipse = Ellipse {
        center: Point::new(cx, cy),
        major_axis: 2.0 * semi_major_sq.sqrt(),
        minor_axis: 2.0 * semi_minor_sq.sqrt(),
        angle_deg,
    };
    (ellipse.center.is_finite() && ellipse.major_axis.is_finite()).then_some(ellipse)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn sample_ellipse(cx: f64, cy: f64, a: f64, b: f64, angle_deg: f64, n: usize) -> Vec<Point> {
        let theta = angle_deg.to_radians();
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let (x, y) = (a * t.cos(), b * t.sin());
                Point::new(
                    cx + x * theta.cos() - y * theta.sin(),
                    cy + x * theta.sin() + y * theta.cos(),
                )
            })
            .collect()
    }

    #[test]
    fn recovers_rotated_ellipse() {
        let pts = sample_ellipse(100.0, 80.0, 30.0, 15.0, 30.0, 40);
        let e = fit_ellipse(&pts).unwrap();
        assert_abs_diff_eq!(e.center.x, 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.center.y, 80.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.major_axis, 60.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.minor_axis, 30.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.angle_deg, 30.0, epsilon = 1e-6);
    }

    #[test]
    fn vertical_major_axis_reports_ninety_degrees() {
        let pts = sample_ellipse(0.0, 0.0, 20.0, 5.0, 90.0, 16);
        let e = fit_ellipse(&pts).unwrap();
        assert_abs_diff_eq!(e.angle_deg, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn negative_rotation_wraps_into_range() {
        let pts = sample_ellipse(10.0, 10.0, 12.0, 4.0, -45.0, 24);
        let e = fit_ellipse(&pts).unwrap();
        assert_abs_diff_eq!(e.angle_deg, 135.0, epsilon = 1e-6);
    }

    #[test]
    fn five_points_on_a_circle_are_enough() {
        let pts = sample_ellipse(50.0, 50.0, 10.0, 10.0, 0.0, 5);
        let e = fit_ellipse(&pts).unwrap();
        assert_abs_diff_eq!(e.center.x, 50.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.major_axis, 20.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.minor_axis, 20.0, epsilon = 1e-6);
    }

    #[test]
    fn fewer_than_five_distinct_points_fail() {
        let mut pts = sample_ellipse(0.0, 0.0, 5.0, 3.0, 0.0, 4);
        pts.push(pts[0]);
        pts.push(pts[1]);
        assert!(fit_ellipse(&pts).is_none());
    }

    #[test]
    fn hyperbolic_point_sets_still_give_an_ellipse() {
        // Five points whose exact interpolating conic is a hyperbola.
        let pts = [
            Point::new(1.0, 1.0),
            Point::new(-1.0, -1.0),
            Point::new(2.0, 0.5),
            Point::new(-2.0, -0.5),
            Point::new(0.5, 2.0),
        ];
        let e = fit_ellipse(&pts).unwrap();
        assert!(e.major_axis.is_finite() && e.minor_axis > 0.0);
        assert!(e.major_axis >= e.minor_axis);
    }

    #[test]
    fn elongated_rectangle_is_horizontal() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(40.0, 0.0),
            Point::new(40.0, 10.0),
            Point::new(20.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let e = fit_ellipse(&pts).unwrap();
        assert_abs_diff_eq!(e.center.x, 20.0, epsilon = 1e-3);
        assert_abs_diff_eq!(e.center.y, 5.0, epsilon = 1e-3);
        let tilt = e.angle_deg.min(180.0 - e.angle_deg);
        assert!(tilt < 1e-3, "angle {}", e.angle_deg);
    }

    #[test]
    fn collinear_points_fail() {
        let pts: Vec<Point> = (0..8).map(|i| Point::new(f64::from(i), f64::from(2 * i))).collect();
        assert!(fit_ellipse(&pts).is_none());
    }
}
