//! grainscope-engine: quantitative metallography (sans-IO).
//!
//! Turns micrographs into grain contours and derives measurements and
//! ASTM E112 grain-size numbers from them:
//!
//! - [`segment`]: decode -> grayscale -> blur -> threshold -> trace ->
//!   simplify.
//! - [`measure`]: per-grain area, perimeter, equivalent diameter and
//!   ellipse orientation in calibrated units.
//! - [`astm`]: planimetric and intercept grain-size numbers.
//! - [`phase`]: two-phase area fractions.
//! - [`edit`]: manual contour splitting.
//! - [`chart`]: synthetic Voronoi comparison charts.
//!
//! This crate has **no I/O dependencies**. Every operation takes bytes
//! or values and returns new values; the per-sample
//! [`SampleResults`] document is updated by the caller, and storage
//! lives in `grainscope-io`.

pub mod astm;
pub mod blur;
pub mod calibrate;
pub mod chart;
pub mod config;
pub mod contour;
pub mod document;
pub mod edit;
pub mod ellipse;
pub mod geometry;
pub mod grayscale;
pub mod measure;
pub mod phase;
pub mod render;
pub mod segment;
pub mod simplify;
pub mod split;
pub mod stats;
pub mod threshold;
pub mod types;
pub mod voronoi;

pub use astm::{InterceptReport, InterceptTest, PlanimetricReport, intercept, planimetric};
pub use calibrate::Scale;
pub use chart::{ComparisonChart, synthesize_charts};
pub use config::{ChartConfig, MeasureConfig, SegmentConfig};
pub use document::{MultiphaseResult, PlanimetricFields, SampleResults};
pub use edit::split_contour;
pub use measure::{GrainMeasurement, MeasureOutput, measure};
pub use phase::{PhaseAnalysis, analyze};
pub use segment::{Segmentation, segment};
pub use stats::{HistogramBin, MeasurementSummary, histogram, summarize};
pub use threshold::ThresholdWindow;
pub use types::{Contour, Dimensions, EngineError, PixelPoint, Point, Prerequisite};
