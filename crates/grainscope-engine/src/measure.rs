//! Per-grain measurement.
//!
//! Each contour is turned into a [`GrainMeasurement`] using the geometry
//! kernel for area and perimeter and the ellipse fit for orientation.
//! Contours that cannot be measured, or that are smaller than the
//! operator's minimum diameter, are dropped from both the measurement
//! list and the returned contour list, so the two stay index-aligned.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::calibrate::Scale;
use crate::config::MeasureConfig;
use crate::ellipse::{MIN_FIT_POINTS, fit_ellipse};
use crate::geometry::{AREA_EPSILON, contour_area, contour_perimeter};
use crate::types::{Contour, EngineError, Prerequisite};

/// Geometric record for one grain.
///
/// The equivalent diameter is derived from the physical area on demand
/// and is only materialized when serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainMeasurement {
    /// 1-based position among the measured grains.
    pub grain_id: u32,
    /// Shoelace area in square pixels.
    pub area_px: f64,
    /// Area in square millimetres.
    pub area_mm2: f64,
    /// Closed perimeter in millimetres.
    pub perimeter_mm: f64,
    /// Major-axis direction of the fitted ellipse, degrees in `[0, 180)`.
    pub orientation_deg: f64,
    /// Fitted ellipse center, column.
    pub center_x_px: f64,
    /// Fitted ellipse center, row.
    pub center_y_px: f64,
}

impl GrainMeasurement {
    /// Diameter of the circle with the same area, in millimetres.
    #[must_use]
    pub fn equiv_diameter_mm(&self) -> f64 {
        equivalent_diameter(self.area_mm2)
    }
}

/// Diameter of the circle whose area is `area`.
#[must_use]
pub fn equivalent_diameter(area: f64) -> f64 {
    2.0 * (area / PI).sqrt()
}

/// Serde-compatible proxy for [`GrainMeasurement`].
///
/// `equiv_diameter_mm` is written for consumers of the stored document
/// and ignored when reading it back.
#[derive(Serialize, Deserialize)]
struct GrainMeasurementProxy {
    grain_id: u32,
    area_px: f64,
    area_mm2: f64,
    perimeter_mm: f64,
    #[serde(default, skip_deserializing)]
    equiv_diameter_mm: f64,
    orientation_deg: f64,
    center_x_px: f64,
    center_y_px: f64,
}

impl Serialize for GrainMeasurement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GrainMeasurementProxy {
            grain_id: self.grain_id,
            area_px: self.area_px,
            area_mm2: self.area_mm2,
            perimeter_mm: self.perimeter_mm,
            equiv_diameter_mm: self.equiv_diameter_mm(),
            orientation_deg: self.orientation_deg,
            center_x_px: self.center_x_px,
            center_y_px: self.center_y_px,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GrainMeasurement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = GrainMeasurementProxy::deserialize(deserializer)?;
        Ok(Self {
            grain_id: proxy.grain_id,
            area_px: proxy.area_px,
            area_mm2: proxy.area_mm2,
            perimeter_mm: proxy.perimeter_mm,
            orientation_deg: proxy.orientation_deg,
            center_x_px: proxy.center_x_px,
            center_y_px: proxy.center_y_px,
        })
    }
}

/// Surviving contours paired with their measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureOutput {
    /// Contours that produced a measurement, in original order.
    pub contours: Vec<Contour>,
    /// One record per surviving contour; `measurements[i]` describes
    /// `contours[i]` and has `grain_id == i + 1`.
    pub measurements: Vec<GrainMeasurement>,
}

/// Measure every contour.
///
/// A contour is skipped when it has fewer than five vertices, zero area,
/// an equivalent diameter below `config.min_diameter_mm`, or no ellipse
/// fit. The size filter compares in pixel space against
/// `min_diameter_mm * scale`.
///
/// # Errors
///
/// - [`EngineError::MissingPrerequisite`] with
///   [`Prerequisite::Calibration`] if `scale` is `None`, checked first.
/// - [`EngineError::MissingPrerequisite`] with
///   [`Prerequisite::Contours`] if `contours` is empty.
/// - [`EngineError::InvalidInput`] if the minimum diameter is negative
///   or not finite.
pub fn measure(
    contours: &[Contour],
    scale: Option<Scale>,
    config: &MeasureConfig,
) -> Result<MeasureOutput, EngineError> {
    let scale = scale.ok_or(EngineError::MissingPrerequisite(Prerequisite::Calibration))?;
    if contours.is_empty() {
        return Err(EngineError::MissingPrerequisite(Prerequisite::Contours));
    }
    let min_mm = config.min_diameter_mm;
    if !(min_mm.is_finite() && min_mm >= 0.0) {
        return Err(EngineError::invalid(format!(
            "minimum diameter must be non-negative, got {min_mm}"
        )));
    }
    let min_diameter_px = scale.mm_to_px(min_mm);

    let mut output = MeasureOutput {
        contours: Vec::new(),
        measurements: Vec::new(),
    };
    let (mut too_few, mut too_small, mut unfit) = (0_usize, 0_usize, 0_usize);

    for contour in contours {
        if contour.len() < MIN_FIT_POINTS {
            too_few += 1;
            continue;
        }
        let points = contour.to_points();
        let area_px = contour_area(&points);
        if area_px < AREA_EPSILON {
            too_few += 1;
            continue;
        }
        if equivalent_diameter(area_px) < min_diameter_px {
            too_small += 1;
            continue;
        }
        let Some(ellipse) = fit_ellipse(&points) else {
            unfit += 1;
            continue;
        };

        let grain_id = u32::try_from(output.measurements.len() + 1)
            .map_err(|_| EngineError::invalid("too many contours"))?;
        output.measurements.push(GrainMeasurement {
            grain_id,
            area_px,
            area_mm2: scale.px2_to_mm2(area_px),
            perimeter_mm: scale.px_to_mm(contour_perimeter(&points, true)),
            orientation_deg: ellipse.angle_deg,
            center_x_px: ellipse.center.x,
            center_y_px: ellipse.center.y,
        });
        output.contours.push(contour.clone());
    }

    if unfit > 0 {
        tracing::warn!(unfit, "skipped contours with no ellipse fit");
    }
    tracing::debug!(
        measured = output.measurements.len(),
        too_few,
        too_small,
        unfit,
        "measured contours"
    );
    Ok(output)
}
