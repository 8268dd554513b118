//! Summary statistics and histograms over grain measurements.

use serde::{Deserialize, Serialize};

use crate::measure::GrainMeasurement;

/// Upper bound on histogram bins.
pub const MAX_HISTOGRAM_BINS: usize = 20;

/// Aggregate figures for a measured sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    /// Number of grains.
    pub count: usize,
    /// Mean equivalent diameter in mm.
    pub mean_diameter_mm: f64,
    /// Smallest equivalent diameter in mm.
    pub min_diameter_mm: f64,
    /// Largest equivalent diameter in mm.
    pub max_diameter_mm: f64,
    /// Population standard deviation of the equivalent diameter.
    pub std_diameter_mm: f64,
    /// Mean grain area in mm².
    pub mean_area_mm2: f64,
    /// Sum of grain areas in mm².
    pub total_area_mm2: f64,
}

/// One histogram bin covering `[lower, upper)`; the last bin also
/// includes its upper edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive lower edge.
    pub lower: f64,
    /// Upper edge.
    pub upper: f64,
    /// Number of values in the bin.
    pub count: usize,
}

/// Summarize `measurements`, or `None` when there are none.
#[must_use]
pub fn summarize(measurements: &[GrainMeasurement]) -> Option<MeasurementSummary> {
    if measurements.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = measurements.len() as f64;
    let diameters: Vec<f64> = measurements.iter().map(GrainMeasurement::equiv_diameter_mm).collect();

    let mean = diameters.iter().sum::<f64>() / n;
    let variance = diameters.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let total_area: f64 = measurements.iter().map(|m| m.area_mm2).sum();

    Some(MeasurementSummary {
        count: measurements.len(),
        mean_diameter_mm: mean,
        min_diameter_mm: diameters.iter().copied().fold(f64::INFINITY, f64::min),
        max_diameter_mm: diameters.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_diameter_mm: variance.sqrt(),
        mean_area_mm2: total_area / n,
        total_area_mm2: total_area,
    })
}

/// Equal-width histogram with `min(ceil(sqrt(n)), 20)` bins.
///
/// Non-finite values are ignored. All-equal input yields a single bin.
#[must_use]
pub fn histogram(values: &[f64]) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Vec::new();
    }
    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if hi - lo <= 0.0 {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: finite.len(),
        }];
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let bins = ((finite.len() as f64).sqrt().ceil() as usize).clamp(1, MAX_HISTOGRAM_BINS);
    #[allow(clippy::cast_precision_loss)]
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let lower = (i as f64).mul_add(width, lo);
            let upper = if i + 1 == bins { hi } else { lower + width };
            HistogramBin { lower, upper, count: 0 }
        })
        .collect();

    for v in finite {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}
