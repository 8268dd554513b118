//! Per-sample operations over a blob store and a result store.
//!
//! Every mutating operation is a read-modify-write: load the record, run
//! the engine, and save only if the engine call succeeded. A failing
//! operation leaves the stored record as it was.

use grainscope_engine::render::render_contours;
use grainscope_engine::{
    ChartConfig, ComparisonChart, Contour, EngineError, GrainMeasurement, HistogramBin,
    InterceptReport, InterceptTest, MeasureConfig, MeasurementSummary, MultiphaseResult,
    PlanimetricReport, Point, Prerequisite, SampleResults, Scale, SegmentConfig, histogram,
    summarize,
};
use serde::Serialize;

use crate::store::{BlobStore, ResultStore, SampleId, SampleRecord, StoreError};

/// Errors from a service operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The analysis itself failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Reading or writing storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `create_sample` was called with an id that is already in use.
    #[error("sample {0} already exists")]
    SampleExists(SampleId),

    /// `create_sample` was given an image name that is already stored or
    /// reserved for previews.
    #[error("image {0:?} already exists or is reserved")]
    ImageExists(String),
}

/// Summary statistics plus an equivalent-diameter histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStatistics {
    /// `None` when every contour was filtered out during measurement.
    pub summary: Option<MeasurementSummary>,
    /// Histogram of equivalent diameters in mm.
    pub histogram: Vec<HistogramBin>,
}

const PREVIEW_SUFFIX: &str = ".multiphase.png";

/// Blob name of the multiphase preview for a sample.
///
/// Sample ids never contain `.`, so no two samples share a preview name
/// and no preview name is itself `<id>.<ext>`.
#[must_use]
pub fn multiphase_preview_name(id: &SampleId) -> String {
    format!("{id}{PREVIEW_SUFFIX}")
}

/// Runs engine operations against stored samples.
#[derive(Debug)]
pub struct SampleService<B, R> {
    blobs: B,
    results: R,
}

impl<B: BlobStore, R: ResultStore> SampleService<B, R> {
    /// Wrap a blob store and a result store.
    pub const fn new(blobs: B, results: R) -> Self {
        Self { blobs, results }
    }

    /// The blob store.
    pub const fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Load the stored record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such sample.
    pub fn load(&self, id: &SampleId) -> Result<SampleRecord, ServiceError> {
        Ok(self.results.load(id)?)
    }

    /// Ids of all stored samples.
    ///
    /// # Errors
    ///
    /// Returns a store error if the listing fails.
    pub fn list(&self) -> Result<Vec<SampleId>, ServiceError> {
        Ok(self.results.list()?)
    }

    fn update<T>(
        &mut self,
        id: &SampleId,
        f: impl FnOnce(&mut SampleRecord) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut record = self.results.load(id)?;
        let value = f(&mut record)?;
        self.results.save(id, &record)?;
        Ok(value)
    }

    /// Store a micrograph and segment it into a new sample.
    ///
    /// The image is written first; if segmentation fails it is deleted
    /// again and no record is created. Existing blobs are never replaced.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::SampleExists`] if `id` is taken.
    /// - [`ServiceError::ImageExists`] if `image_name` is already stored
    ///   or ends in the preview suffix.
    /// - Engine errors from segmentation.
    /// - Store errors.
    pub fn create_sample(
        &mut self,
        id: &SampleId,
        image_name: &str,
        image_bytes: &[u8],
        config: &SegmentConfig,
    ) -> Result<SampleRecord, ServiceError> {
        if self.results.contains(id)? {
            return Err(ServiceError::SampleExists(id.clone()));
        }
        if image_name.ends_with(PREVIEW_SUFFIX) || self.blobs.exists(image_name)? {
            return Err(ServiceError::ImageExists(image_name.to_owned()));
        }
        self.blobs.write(image_name, image_bytes)?;

        let segmentation = match grainscope_engine::segment(image_bytes, config) {
            Ok(segmentation) => segmentation,
            Err(err) => {
                if let Err(cleanup) = self.blobs.delete(image_name) {
                    tracing::warn!(%cleanup, image_name, "failed to remove rejected image");
                }
                return Err(err.into());
            }
        };

        let record = SampleRecord {
            image_name: image_name.to_owned(),
            scale_pixels_per_mm: None,
            results: SampleResults::from_segmentation(&segmentation),
        };
        self.results.save(id, &record)?;
        tracing::info!(
            %id,
            contours = segmentation.contours.len(),
            width = segmentation.dimensions.width,
            height = segmentation.dimensions.height,
            "created sample"
        );
        Ok(record)
    }

    /// Set the sample's calibration.
    ///
    /// # Errors
    ///
    /// Returns a store error if the sample cannot be loaded or saved.
    pub fn calibrate(&mut self, id: &SampleId, scale: Scale) -> Result<Scale, ServiceError> {
        self.update(id, |record| {
            record.scale_pixels_per_mm = Some(scale);
            Ok(scale)
        })?;
        tracing::info!(%id, %scale, "calibrated sample");
        Ok(scale)
    }

    /// Measure the stored contours and replace them with the surviving
    /// ones.
    ///
    /// # Errors
    ///
    /// Engine errors from [`grainscope_engine::measure`], or store errors.
    pub fn measure(
        &mut self,
        id: &SampleId,
        config: &MeasureConfig,
    ) -> Result<Vec<GrainMeasurement>, ServiceError> {
        let measurements = self.update(id, |record| {
            let contours = record.results.contours().unwrap_or_default();
            let output = grainscope_engine::measure(contours, record.scale_pixels_per_mm, config)?;
            let measurements = output.measurements.clone();
            record.results.store_measurements(output);
            Ok(measurements)
        })?;
        tracing::info!(%id, grains = measurements.len(), "measured sample");
        Ok(measurements)
    }

    /// Evaluate the planimetric grain-size number.
    ///
    /// # Errors
    ///
    /// Engine errors from [`grainscope_engine::planimetric`], or store
    /// errors.
    pub fn planimetric(
        &mut self,
        id: &SampleId,
        magnification: f64,
    ) -> Result<PlanimetricReport, ServiceError> {
        let report = self.update(id, |record| {
            let report = grainscope_engine::planimetric(
                record.results.grain_count(),
                record.scale_pixels_per_mm,
                record.results.dimensions(),
                magnification,
            )?;
            record.results.set_planimetric(&report);
            Ok(report)
        })?;
        tracing::info!(%id, g = report.g, n_a = report.n_a, "planimetric evaluation");
        Ok(report)
    }

    /// Evaluate an intercept test from operator counts.
    ///
    /// # Errors
    ///
    /// Engine errors from [`grainscope_engine::intercept`], or store
    /// errors.
    pub fn intercept(
        &mut self,
        id: &SampleId,
        test: &InterceptTest,
    ) -> Result<InterceptReport, ServiceError> {
        let report = self.update(id, |record| {
            let report = grainscope_engine::intercept(test, record.scale_pixels_per_mm)?;
            record.results.set_intercept(test, &report);
            Ok(report)
        })?;
        tracing::info!(%id, ?report, "intercept evaluation");
        Ok(report)
    }

    /// Record the operator's comparison-chart choice.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] unless `g` is an integer in
    /// `(0, 15)`, or store errors.
    pub fn set_comparison(&mut self, id: &SampleId, g: f64) -> Result<i32, ServiceError> {
        self.update(id, |record| Ok(record.results.set_comparison(g)?))
    }

    /// Split the source image into two phases at `threshold`.
    ///
    /// The preview PNG is written to the blob store under
    /// [`multiphase_preview_name`]; the record keeps its name. The record
    /// is saved before the preview is written, and put back if the write
    /// fails, so a failed run leaves both untouched.
    ///
    /// # Errors
    ///
    /// Engine errors from [`grainscope_engine::analyze`], or store errors.
    pub fn multiphase(
        &mut self,
        id: &SampleId,
        threshold: i64,
    ) -> Result<MultiphaseResult, ServiceError> {
        let original = self.results.load(id)?;
        let image = self.blobs.read(&original.image_name)?;
        let analysis = grainscope_engine::analyze(&image, threshold)?;

        let result = MultiphaseResult {
            threshold: analysis.threshold,
            phase_1_percent: analysis.phase_1_percent,
            phase_2_percent: analysis.phase_2_percent,
            preview_image: multiphase_preview_name(id),
        };
        let mut record = original.clone();
        record.results.set_multiphase(result.clone());
        self.results.save(id, &record)?;

        if let Err(err) = self.blobs.write(&result.preview_image, &analysis.preview_png) {
            if let Err(restore) = self.results.save(id, &original) {
                tracing::warn!(%restore, %id, "failed to restore record after preview write");
            }
            return Err(err.into());
        }
        tracing::info!(
            %id,
            threshold = result.threshold,
            phase_1 = result.phase_1_percent,
            "multiphase analysis"
        );
        Ok(result)
    }

    /// Replace every contour of the sample. Measurements are dropped.
    ///
    /// # Errors
    ///
    /// Returns a store error if the sample cannot be loaded or saved.
    pub fn retouch(&mut self, id: &SampleId, contours: Vec<Contour>) -> Result<(), ServiceError> {
        let count = contours.len();
        self.update(id, |record| {
            record.results.retouch(contours);
            Ok(())
        })?;
        tracing::info!(%id, contours = count, "retouched contours");
        Ok(())
    }

    /// Split the stored contour at `index` along `line`.
    ///
    /// With `apply` the contour is replaced in place by the pieces and
    /// measurements are dropped; otherwise nothing is stored.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingPrerequisite`] if the sample has no
    ///   contours; [`EngineError::InvalidInput`] for a bad index or line.
    /// - [`EngineError::EmptyGeometry`] / [`EngineError::InternalGeometry`]
    ///   from the split itself.
    pub fn split_contour(
        &mut self,
        id: &SampleId,
        index: usize,
        line: &[Point],
        apply: bool,
    ) -> Result<Vec<Contour>, ServiceError> {
        if !apply {
            let record = self.results.load(id)?;
            let contour = record.results.contour_at(index)?;
            return Ok(grainscope_engine::split_contour(contour, line)?);
        }
        self.update(id, |record| {
            let pieces = grainscope_engine::split_contour(record.results.contour_at(index)?, line)?;
            record.results.replace_contour(index, pieces.clone())?;
            Ok(pieces)
        })
    }

    /// Render comparison charts at the sample's image size.
    ///
    /// # Errors
    ///
    /// Engine errors from [`grainscope_engine::synthesize_charts`], or
    /// store errors.
    pub fn comparison_charts(
        &self,
        id: &SampleId,
        magnification: f64,
        g_values: &[i32],
        config: &ChartConfig,
    ) -> Result<Vec<ComparisonChart>, ServiceError> {
        let record = self.results.load(id)?;
        Ok(grainscope_engine::synthesize_charts(
            record.results.dimensions(),
            magnification,
            g_values,
            config,
        )?)
    }

    /// Summary statistics and diameter histogram of the measurements.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingPrerequisite`] if the sample has not been
    /// measured, or store errors.
    pub fn statistics(&self, id: &SampleId) -> Result<SampleStatistics, ServiceError> {
        let record = self.results.load(id)?;
        let measurements = record
            .results
            .measurements()
            .ok_or(EngineError::MissingPrerequisite(Prerequisite::Measurements))?;
        let diameters: Vec<f64> = measurements
            .iter()
            .map(GrainMeasurement::equiv_diameter_mm)
            .collect();
        Ok(SampleStatistics {
            summary: summarize(measurements),
            histogram: histogram(&diameters),
        })
    }

    /// PNG of the stored contours, white on black.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingPrerequisite`] if dimensions or contours are
    /// missing, or store errors.
    pub fn overlay(&self, id: &SampleId) -> Result<Vec<u8>, ServiceError> {
        let record = self.results.load(id)?;
        let dimensions = record
            .results
            .dimensions()
            .ok_or(EngineError::MissingPrerequisite(Prerequisite::ImageDimensions))?;
        let contours = record
            .results
            .contours()
            .ok_or(EngineError::MissingPrerequisite(Prerequisite::Contours))?;
        Ok(render_contours(dimensions, contours)?)
    }
}
