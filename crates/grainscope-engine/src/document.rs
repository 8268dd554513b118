//! The per-sample result document.
//!
//! Fields are private so that every change goes through a method that
//! keeps derived data consistent: replacing contours drops the
//! measurements computed from them, and storing new measurements drops
//! the planimetric result computed from the old ones. Intercept,
//! comparison and multiphase results do not depend on contours and are
//! never touched by contour edits.
//!
//! On disk the document is a flat JSON object (`contours`,
//! `image_width_px`, `measurements`, `astm_g`, ...) with absent fields
//! omitted.

use serde::{Deserialize, Serialize};

use crate::astm::{InterceptReport, InterceptTest, PlanimetricReport, validate_g};
use crate::measure::{GrainMeasurement, MeasureOutput};
use crate::segment::Segmentation;
use crate::types::{Contour, Dimensions, EngineError, Prerequisite};

/// Planimetric figures kept in the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanimetricFields {
    /// Grain-size number.
    pub g: f64,
    /// Grains per square inch at 100X.
    pub n_a: f64,
}

/// Stored multiphase outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiphaseResult {
    /// Threshold the image was split at.
    pub threshold: u8,
    /// Percentage above the threshold.
    pub phase_1_percent: f64,
    /// Percentage at or below the threshold.
    pub phase_2_percent: f64,
    /// Blob name of the binary preview image.
    pub preview_image: String,
}

/// Mutable analysis state of one sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleResults {
    dimensions: Option<Dimensions>,
    contours: Option<Vec<Contour>>,
    measurements: Option<Vec<GrainMeasurement>>,
    planimetric: Option<PlanimetricFields>,
    intercept: InterceptReport,
    comparison: Option<i32>,
    multiphase: Option<MultiphaseResult>,
}

impl SampleResults {
    /// Start a document from a fresh segmentation.
    #[must_use]
    pub fn from_segmentation(segmentation: &Segmentation) -> Self {
        Self {
            dimensions: Some(segmentation.dimensions),
            contours: Some(segmentation.contours.clone()),
            ..Self::default()
        }
    }

    /// Image size recorded at segmentation.
    #[must_use]
    pub const fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Current grain boundaries.
    #[must_use]
    pub fn contours(&self) -> Option<&[Contour]> {
        self.contours.as_deref()
    }

    /// Measurements, index-aligned with [`Self::contours`].
    #[must_use]
    pub fn measurements(&self) -> Option<&[GrainMeasurement]> {
        self.measurements.as_deref()
    }

    /// Number of measured grains, `None` if not measured.
    #[must_use]
    pub fn grain_count(&self) -> Option<usize> {
        self.measurements.as_ref().map(Vec::len)
    }

    /// Planimetric grain-size result.
    #[must_use]
    pub const fn planimetric(&self) -> Option<PlanimetricFields> {
        self.planimetric
    }

    /// Intercept grain-size results.
    #[must_use]
    pub const fn intercept(&self) -> &InterceptReport {
        &self.intercept
    }

    /// Operator-asserted grain-size number.
    #[must_use]
    pub const fn comparison(&self) -> Option<i32> {
        self.comparison
    }

    /// Multiphase outcome.
    #[must_use]
    pub const fn multiphase(&self) -> Option<&MultiphaseResult> {
        self.multiphase.as_ref()
    }

    /// Replace every contour. Measurements are dropped; grain-size
    /// results stay until the next evaluation.
    pub fn retouch(&mut self, contours: Vec<Contour>) {
        self.contours = Some(contours);
        self.measurements = None;
    }

    /// Replace the contour at `index` with `pieces`, in place. Same
    /// consequences as [`Self::retouch`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingPrerequisite`] if there are no contours.
    /// - [`EngineError::InvalidInput`] if `index` is out of range.
    pub fn replace_contour(&mut self, index: usize, pieces: Vec<Contour>) -> Result<(), EngineError> {
        self.contour_at(index)?;
        let mut contours = self.contours.take().unwrap_or_default();
        contours.splice(index..=index, pieces);
        self.retouch(contours);
        Ok(())
    }

    /// Look up one contour.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingPrerequisite`] if there are no contours.
    /// - [`EngineError::InvalidInput`] if `index` is out of range.
    pub fn contour_at(&self, index: usize) -> Result<&Contour, EngineError> {
        let contours = self
            .contours
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(EngineError::MissingPrerequisite(Prerequisite::Contours))?;
        contours.get(index).ok_or_else(|| {
            EngineError::invalid(format!(
                "contour index {index} out of range (sample has {})",
                contours.len()
            ))
        })
    }

    /// Store a measurement run. The filtered contours replace the stored
    /// ones and the planimetric result is dropped.
    pub fn store_measurements(&mut self, output: MeasureOutput) {
        self.contours = Some(output.contours);
        self.measurements = Some(output.measurements);
        self.planimetric = None;
    }

    /// Store a planimetric evaluation.
    pub fn set_planimetric(&mut self, report: &PlanimetricReport) {
        self.planimetric = Some(PlanimetricFields {
            g: report.g,
            n_a: report.n_a,
        });
    }

    /// Store an intercept evaluation. A line test replaces the global,
    /// horizontal and vertical values (an undefined axis clears any
    /// older value); a circle test replaces only the circle value.
    pub fn set_intercept(&mut self, test: &InterceptTest, report: &InterceptReport) {
        match test {
            InterceptTest::Lines { .. } => {
                self.intercept.global = report.global;
                self.intercept.horizontal = report.horizontal;
                self.intercept.vertical = report.vertical;
            }
            InterceptTest::Circles { .. } => self.intercept.circle = report.circle,
        }
    }

    /// Record the operator's comparison choice.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] unless `g` is an integer in
    /// `(0, 15)`.
    pub fn set_comparison(&mut self, g: f64) -> Result<i32, EngineError> {
        let g = validate_g(g)?;
        self.comparison = Some(g);
        Ok(g)
    }

    /// Store a multiphase outcome.
    pub fn set_multiphase(&mut self, result: MultiphaseResult) {
        self.multiphase = Some(result);
    }
}

/// Flat on-disk layout of [`SampleResults`].
#[derive(Default, Serialize, Deserialize)]
struct SampleResultsProxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contours: Option<Vec<Contour>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_width_px: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_height_px: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    measurements: Option<Vec<GrainMeasurement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_n_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_g_intercept_global: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_g_intercept_horizontal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_g_intercept_vertical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_g_intercept_circle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astm_g_comparison: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    multiphase: Option<MultiphaseResult>,
}

impl Serialize for SampleResults {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SampleResultsProxy {
            contours: self.contours.clone(),
            image_width_px: self.dimensions.map(|d| d.width),
            image_height_px: self.dimensions.map(|d| d.height),
            measurements: self.measurements.clone(),
            astm_g: self.planimetric.map(|p| p.g),
            astm_n_a: self.planimetric.map(|p| p.n_a),
            astm_g_intercept_global: self.intercept.global,
            astm_g_intercept_horizontal: self.intercept.horizontal,
            astm_g_intercept_vertical: self.intercept.vertical,
            astm_g_intercept_circle: self.intercept.circle,
            astm_g_comparison: self.comparison,
            multiphase: self.multiphase.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SampleResults {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = SampleResultsProxy::deserialize(deserializer)?;

        let dimensions = match (proxy.image_width_px, proxy.image_height_px) {
            (Some(w), Some(h)) => Some(Dimensions::new(w, h)),
            (None, None) => None,
            _ => {
                return Err(serde::de::Error::custom(
                    "image_width_px and image_height_px must be present together",
                ));
            }
        };
        let planimetric = match (proxy.astm_g, proxy.astm_n_a) {
            (Some(g), Some(n_a)) => Some(PlanimetricFields { g, n_a }),
            _ => None,
        };

        Ok(Self {
            dimensions,
            contours: proxy.contours,
            measurements: proxy.measurements,
            planimetric,
            intercept: InterceptReport {
                global: proxy.astm_g_intercept_global,
                horizontal: proxy.astm_g_intercept_horizontal,
                vertical: proxy.astm_g_intercept_vertical,
                circle: proxy.astm_g_intercept_circle,
            },
            comparison: proxy.astm_g_comparison,
            multiphase: proxy.multiphase,
        })
    }
}
