//! ASTM E112 grain-size numbers.
//!
//! Two independent estimates are provided. The planimetric method counts
//! measured grains per unit area of the whole field; the intercept method
//! works from operator-counted boundary crossings along test lines or
//! circles and never looks at contours. Edge grains are counted as whole
//! grains in the planimetric count.

use serde::{Deserialize, Serialize};

use crate::calibrate::Scale;
use crate::types::{Dimensions, EngineError, Prerequisite};

/// Square millimetres per square inch.
pub const MM2_PER_IN2: f64 = 645.16;

/// Magnification the ASTM tables are defined at.
pub const REFERENCE_MAGNIFICATION: f64 = 100.0;

/// Exclusive bounds of the grain-size indices accepted for comparison
/// charts and operator assertions.
pub const G_RANGE_EXCLUSIVE: (i32, i32) = (0, 15);

/// Result of the planimetric method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanimetricReport {
    /// Field area in square millimetres.
    pub total_area_mm2: f64,
    /// Grains per square millimetre at 1×.
    pub n_per_mm2: f64,
    /// Grains per square inch at 1×.
    pub n_per_in2: f64,
    /// Grains per square inch at the reference magnification.
    pub n_a: f64,
    /// Grain-size number.
    pub g: f64,
}

/// Planimetric grain-size number from a grain count.
///
/// Preconditions are checked in order: magnification, grain count
/// (`None` when the sample has not been measured), calibration, image
/// dimensions.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if `magnification` is not positive.
/// - [`EngineError::MissingPrerequisite`] naming the first absent input.
/// - [`EngineError::DegenerateResult`] if the grain density is zero.
pub fn planimetric(
    grain_count: Option<usize>,
    scale: Option<Scale>,
    dimensions: Option<Dimensions>,
    magnification: f64,
) -> Result<PlanimetricReport, EngineError> {
    check_magnification(magnification)?;
    let grain_count =
        grain_count.ok_or(EngineError::MissingPrerequisite(Prerequisite::Measurements))?;
    let scale = scale.ok_or(EngineError::MissingPrerequisite(Prerequisite::Calibration))?;
    let dimensions =
        dimensions.ok_or(EngineError::MissingPrerequisite(Prerequisite::ImageDimensions))?;

    let total_area_mm2 = scale.px2_to_mm2(dimensions.area());
    if total_area_mm2 <= 0.0 {
        return Err(EngineError::degenerate("image has zero area"));
    }

    #[allow(clippy::cast_precision_loss)]
    let n_per_mm2 = grain_count as f64 / total_area_mm2;
    let n_per_in2 = n_per_mm2 * MM2_PER_IN2;
    let n_a = n_per_in2 * (magnification / REFERENCE_MAGNIFICATION).powi(2);
    if !(n_a > 0.0 && n_a.is_finite()) {
        return Err(EngineError::degenerate(format!(
            "grain density N_A = {n_a} has no grain-size number"
        )));
    }

    Ok(PlanimetricReport {
        total_area_mm2,
        n_per_mm2,
        n_per_in2,
        n_a,
        g: n_a.log2() + 1.0,
    })
}

/// Operator-supplied counts for the intercept method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test_type", rename_all = "snake_case")]
pub enum InterceptTest {
    /// Separate horizontal and vertical test lines.
    Lines {
        /// Boundary crossings on the horizontal lines.
        h_intercepts: f64,
        /// Total length of the horizontal lines in pixels.
        h_length_px: f64,
        /// Boundary crossings on the vertical lines.
        v_intercepts: f64,
        /// Total length of the vertical lines in pixels.
        v_length_px: f64,
    },
    /// Test circles; triple-point junctions count one and a half.
    Circles {
        /// Total circumference traversed in pixels.
        length_px: f64,
        /// Plain boundary crossings.
        intercepts: f64,
        /// Crossings through a triple-point junction.
        junctions: f64,
    },
}

/// Grain-size numbers from an intercept test. Each field is `None` when
/// its `N_L` is undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterceptReport {
    /// Pooled over both line directions.
    pub global: Option<f64>,
    /// Horizontal lines only.
    pub horizontal: Option<f64>,
    /// Vertical lines only.
    pub vertical: Option<f64>,
    /// Circle test.
    pub circle: Option<f64>,
}

/// Weight of a triple-point junction crossing.
pub const JUNCTION_WEIGHT: f64 = 1.5;

/// `G = 6.6438 log10(N_L) - 3.288`, with `N_L` in intercepts per mm.
///
/// `None` when `N_L` is not positive and finite.
#[must_use]
pub fn g_from_lineal_density(n_l: f64) -> Option<f64> {
    (n_l > 0.0 && n_l.is_finite()).then(|| 6.6438f64.mul_add(n_l.log10(), -3.288))
}

/// Intercepts per millimetre along `length_px`, or `None` when the
/// length is zero.
fn lineal_density(intercepts: f64, length_px: f64, scale: Scale) -> Option<f64> {
    let length_mm = scale.px_to_mm(length_px);
    (length_mm > 0.0).then(|| intercepts / length_mm)
}

/// Intercept grain-size numbers.
///
/// For line tests each direction and the pooled value are evaluated
/// independently; a zero count or zero length yields `None` for that
/// value only. When nothing is derivable the report is all `None`, so
/// storing it clears every value the test owns.
///
/// # Errors
///
/// - [`EngineError::MissingPrerequisite`] if `scale` is `None`.
/// - [`EngineError::InvalidInput`] if any count or length is negative
///   or not finite.
pub fn intercept(test: &InterceptTest, scale: Option<Scale>) -> Result<InterceptReport, EngineError> {
    let scale = scale.ok_or(EngineError::MissingPrerequisite(Prerequisite::Calibration))?;

    let report = match *test {
        InterceptTest::Lines {
            h_intercepts,
            h_length_px,
            v_intercepts,
            v_length_px,
        } => {
            check_count("h_intercepts", h_intercepts)?;
            check_count("h_length_px", h_length_px)?;
            check_count("v_intercepts", v_intercepts)?;
            check_count("v_length_px", v_length_px)?;

            let g_of = |n: f64, len: f64| lineal_density(n, len, scale).and_then(g_from_lineal_density);
            InterceptReport {
                global: g_of(h_intercepts + v_intercepts, h_length_px + v_length_px),
                horizontal: g_of(h_intercepts, h_length_px),
                vertical: g_of(v_intercepts, v_length_px),
                circle: None,
            }
        }
        InterceptTest::Circles {
            length_px,
            intercepts,
            junctions,
        } => {
            check_count("length_px", length_px)?;
            check_count("intercepts", intercepts)?;
            check_count("junctions", junctions)?;

            let effective = JUNCTION_WEIGHT.mul_add(junctions, intercepts);
            InterceptReport {
                circle: lineal_density(effective, length_px, scale)
                    .and_then(g_from_lineal_density),
                ..InterceptReport::default()
            }
        }
    };
    Ok(report)
}

/// Validate an operator-chosen comparison grain-size number.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] unless `g` is an integer
/// strictly between 0 and 15.
pub fn validate_g(g: f64) -> Result<i32, EngineError> {
    let (lo, hi) = G_RANGE_EXCLUSIVE;
    if g.fract() != 0.0 || !(f64::from(lo) < g && g < f64::from(hi)) {
        return Err(EngineError::invalid(format!(
            "grain-size number must be an integer between {} and {}, got {g}",
            lo + 1,
            hi - 1
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(g as i32)
}

pub(crate) fn check_magnification(magnification: f64) -> Result<(), EngineError> {
    if magnification.is_finite() && magnification > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(format!(
            "magnification must be positive, got {magnification}"
        )))
    }
}

fn check_count(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn scale(v: f64) -> Option<Scale> {
        Some(Scale::new(v).unwrap())
    }

    const FIELD: Option<Dimensions> = Some(Dimensions::new(1000, 1000));

    #[test]
    fn planimetric_reference_case() {
        let r = planimetric(Some(50), scale(100.0), FIELD, 100.0).unwrap();
        assert_abs_diff_eq!(r.total_area_mm2, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.n_per_mm2, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(r.n_a, 322.58, epsilon = 1e-9);
        assert_abs_diff_eq!(r.g, 322.58f64.log2() + 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.g, 9.33, epsilon = 0.01);
    }

    #[test]
    fn planimetric_scales_with_magnification() {
        let at_100 = planimetric(Some(50), scale(100.0), FIELD, 100.0).unwrap();
        let at_200 = planimetric(Some(50), scale(100.0), FIELD, 200.0).unwrap();
        assert_abs_diff_eq!(at_200.n_a, 4.0 * at_100.n_a, epsilon = 1e-9);
        assert_abs_diff_eq!(at_200.g, at_100.g + 2.0, epsilon = 1e-12);
    }

    #[test]
    fn planimetric_prerequisites_in_order() {
        assert!(matches!(
            planimetric(None, None, None, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            planimetric(None, None, None, 100.0),
            Err(EngineError::MissingPrerequisite(Prerequisite::Measurements))
        ));
        assert!(matches!(
            planimetric(Some(5), None, None, 100.0),
            Err(EngineError::MissingPrerequisite(Prerequisite::Calibration))
        ));
        assert!(matches!(
            planimetric(Some(5), scale(1.0), None, 100.0),
            Err(EngineError::MissingPrerequisite(Prerequisite::ImageDimensions))
        ));
    }

    #[test]
    fn planimetric_zero_grains_is_degenerate() {
        assert!(matches!(
            planimetric(Some(0), scale(100.0), FIELD, 100.0),
            Err(EngineError::DegenerateResult(_))
        ));
    }

    #[test]
    fn intercept_lines_reference_case() {
        let test = InterceptTest::Lines {
            h_intercepts: 20.0,
            h_length_px: 1000.0,
            v_intercepts: 18.0,
            v_length_px: 1000.0,
        };
        let r = intercept(&test, scale(100.0)).unwrap();
        let g_h = r.horizontal.unwrap();
        assert_abs_diff_eq!(g_h, 6.6438 * 2f64.log10() - 3.288, epsilon = 1e-12);
        assert_abs_diff_eq!(g_h, -1.287, epsilon = 1e-3);
        assert_abs_diff_eq!(r.vertical.unwrap(), 6.6438 * 1.8f64.log10() - 3.288, epsilon = 1e-12);
        assert_abs_diff_eq!(r.global.unwrap(), 6.6438 * 1.9f64.log10() - 3.288, epsilon = 1e-12);
        assert_eq!(r.circle, None);
    }

    #[test]
    fn zero_length_axis_fails_alone() {
        let test = InterceptTest::Lines {
            h_intercepts: 20.0,
            h_length_px: 1000.0,
            v_intercepts: 0.0,
            v_length_px: 0.0,
        };
        let r = intercept(&test, scale(100.0)).unwrap();
        assert!(r.horizontal.is_some());
        assert!(r.global.is_some());
        assert_eq!(r.vertical, None);
    }

    #[test]
    fn circles_weight_junctions() {
        let test = InterceptTest::Circles {
            length_px: 2000.0,
            intercepts: 30.0,
            junctions: 4.0,
        };
        let r = intercept(&test, scale(100.0)).unwrap();
        // (30 + 6) / 20 mm = 1.8 per mm.
        assert_abs_diff_eq!(r.circle.unwrap(), 6.6438 * 1.8f64.log10() - 3.288, epsilon = 1e-12);
        assert_eq!(r.global, None);
    }

    #[test]
    fn nothing_derivable_gives_an_empty_report() {
        let circles = InterceptTest::Circles {
            length_px: 1000.0,
            intercepts: 0.0,
            junctions: 0.0,
        };
        assert_eq!(intercept(&circles, scale(100.0)).unwrap(), InterceptReport::default());

        let lines = InterceptTest::Lines {
            h_intercepts: 0.0,
            h_length_px: 500.0,
            v_intercepts: 0.0,
            v_length_px: 0.0,
        };
        assert_eq!(intercept(&lines, scale(100.0)).unwrap(), InterceptReport::default());
    }

    #[test]
    fn intercept_needs_calibration_and_valid_counts() {
        let test = InterceptTest::Circles {
            length_px: 1000.0,
            intercepts: 3.0,
            junctions: 0.0,
        };
        assert!(matches!(
            intercept(&test, None),
            Err(EngineError::MissingPrerequisite(Prerequisite::Calibration))
        ));
        let negative = InterceptTest::Circles {
            length_px: 1000.0,
            intercepts: -3.0,
            junctions: 0.0,
        };
        assert!(matches!(
            intercept(&negative, scale(1.0)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn intercept_test_json_uses_test_type_tag() {
        let test: InterceptTest = serde_json::from_str(
            r#"{"test_type":"circles","length_px":10,"intercepts":2,"junctions":1}"#,
        )
        .unwrap();
        assert!(matches!(test, InterceptTest::Circles { .. }));
    }

    #[test]
    fn comparison_g_bounds_are_exclusive_integers() {
        assert_eq!(validate_g(1.0).unwrap(), 1);
        assert_eq!(validate_g(14.0).unwrap(), 14);
        for bad in [0.0, 15.0, 7.5, -2.0, f64::NAN] {
            assert!(validate_g(bad).is_err(), "{bad}");
        }
    }
}
