//! Operator-tunable parameters for segmentation, measurement and chart
//! synthesis.
//!
//! Every struct deserializes with missing fields filled from its
//! `Default`, so partial JSON configs are accepted.

use serde::{Deserialize, Serialize};

use crate::simplify::DEFAULT_SIMPLIFY_RATIO;
use crate::threshold::ThresholdWindow;
use crate::types::EngineError;

/// Parameters for turning a micrograph into grain contours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Odd Gaussian kernel size applied before thresholding. 0 or 1
    /// disables blurring.
    pub blur_kernel_size: u32,

    /// Foreground intensity window.
    pub threshold: ThresholdWindow,

    /// Treat pixels outside the window as foreground instead.
    pub invert: bool,

    /// Ramer-Douglas-Peucker tolerance as a fraction of each contour's
    /// perimeter. 0 keeps every traced boundary pixel.
    pub simplify_ratio: f64,
}

impl SegmentConfig {
    /// Default blur kernel size (5×5).
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 5;

    /// Default simplification ratio.
    pub const DEFAULT_SIMPLIFY_RATIO: f64 = DEFAULT_SIMPLIFY_RATIO;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for an even kernel size
    /// above 1 or a negative or non-finite simplification ratio.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.blur_kernel_size > 1 && self.blur_kernel_size % 2 == 0 {
            return Err(EngineError::invalid(format!(
                "blur kernel size must be odd, got {}",
                self.blur_kernel_size
            )));
        }
        if !(self.simplify_ratio.is_finite() && self.simplify_ratio >= 0.0) {
            return Err(EngineError::invalid(format!(
                "simplify ratio must be non-negative, got {}",
                self.simplify_ratio
            )));
        }
        Ok(())
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            threshold: ThresholdWindow::default(),
            invert: false,
            simplify_ratio: Self::DEFAULT_SIMPLIFY_RATIO,
        }
    }
}

/// Parameters for per-grain measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Grains whose equivalent diameter is below this are dropped.
    pub min_diameter_mm: f64,
}

impl MeasureConfig {
    /// No size filtering.
    pub const DEFAULT_MIN_DIAMETER_MM: f64 = 0.0;
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            min_diameter_mm: Self::DEFAULT_MIN_DIAMETER_MM,
        }
    }
}

/// Parameters for comparison chart synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Seed for point scattering and cell shading. The same seed, size,
    /// magnification and G always produce the same image.
    pub seed: u64,

    /// Lloyd relaxation iterations.
    pub iterations: u32,
}

impl ChartConfig {
    /// Default seed.
    pub const DEFAULT_SEED: u64 = 0;

    /// Default number of Lloyd iterations.
    pub const DEFAULT_ITERATIONS: u32 = 3;

    /// Accepted Lloyd iteration counts.
    pub const ITERATION_RANGE: std::ops::RangeInclusive<u32> = 3..=5;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `iterations` is outside
    /// [`Self::ITERATION_RANGE`].
    pub fn validate(&self) -> Result<(), EngineError> {
        if Self::ITERATION_RANGE.contains(&self.iterations) {
            Ok(())
        } else {
            Err(EngineError::invalid(format!(
                "Lloyd iterations must be between {} and {}, got {}",
                Self::ITERATION_RANGE.start(),
                Self::ITERATION_RANGE.end(),
                self.iterations
            )))
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            seed: Self::DEFAULT_SEED,
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }
}
