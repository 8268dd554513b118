//! Shared types for the grainscope analysis engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` for rendered charts and overlays.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An integer pixel coordinate, the vertex type of stored contours.
///
/// Serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct PixelPoint {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl PixelPoint {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round a floating-point position to the nearest pixel.
    ///
    /// Values outside the `i32` range saturate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn round(point: Point) -> Self {
        Self {
            x: point.x.round() as i32,
            y: point.y.round() as i32,
        }
    }
}

impl From<[i32; 2]> for PixelPoint {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<PixelPoint> for [i32; 2] {
    fn from(p: PixelPoint) -> Self {
        [p.x, p.y]
    }
}

impl From<PixelPoint> for Point {
    fn from(p: PixelPoint) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

/// A closed grain boundary: an ordered ring of pixel vertices.
///
/// The closing edge from the last vertex back to the first is implicit;
/// a trailing copy of the first vertex is tolerated but not required.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contour(Vec<PixelPoint>);

impl Contour {
    /// Create a contour from its vertices.
    #[must_use]
    pub const fn new(points: Vec<PixelPoint>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of stored vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.0
    }

    /// Consumes the contour and returns its vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<PixelPoint> {
        self.0
    }

    /// Vertices as floating-point [`Point`]s for the geometry kernel.
    #[must_use]
    pub fn to_points(&self) -> Vec<Point> {
        self.0.iter().map(|&p| Point::from(p)).collect()
    }
}

impl From<Vec<PixelPoint>> for Contour {
    fn from(points: Vec<PixelPoint>) -> Self {
        Self(points)
    }
}

impl FromIterator<PixelPoint> for Contour {
    fn from_iter<I: IntoIterator<Item = PixelPoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel area as a float.
    #[must_use]
    pub fn area(self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

/// A step that must have been completed before an operation can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    /// The sample has no `scale_pixels_per_mm`.
    Calibration,
    /// The sample has no contours (not segmented, or retouched to empty).
    Contours,
    /// The sample has no measurements.
    Measurements,
    /// The sample has no stored image dimensions.
    ImageDimensions,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Calibration => "sample must be calibrated first",
            Self::Contours => "no contours found; segment the image first",
            Self::Measurements => "measurements must be calculated first",
            Self::ImageDimensions => "image dimensions not found; re-import the sample",
        };
        f.write_str(msg)
    }
}

/// Errors produced by engine operations.
///
/// Every variant is local and non-retryable. Operations that fail never
/// return partially updated state.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A parameter is malformed or out of range (scale, threshold,
    /// magnification, grain-size index, intercept counts).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required prior step has not been completed.
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(Prerequisite),

    /// The source image was empty or could not be decoded.
    #[error("could not read image: {0}")]
    InvalidImage(#[from] image::ImageError),

    /// The result is mathematically undefined.
    #[error("degenerate result: {0}")]
    DegenerateResult(String),

    /// A geometric operation produced nothing.
    #[error("operation resulted in an empty geometry")]
    EmptyGeometry,

    /// Unexpected failure inside polygon boolean operations.
    ///
    /// The detail is logged where the failure happens and deliberately
    /// not carried here.
    #[error("an internal error occurred during the geometry operation")]
    InternalGeometry,

    /// Encoding a derived image failed.
    #[error("failed to encode image: {0}")]
    Encode(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidInput`].
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Shorthand for [`EngineError::DegenerateResult`].
    pub(crate) fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateResult(msg.into())
    }
}
