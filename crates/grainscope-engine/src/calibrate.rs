//! Pixel-to-millimetre calibration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{EngineError, Point};

/// Pixels per millimetre. Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Scale(f64);

impl Scale {
    /// Validate a raw pixels-per-millimetre value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `pixels_per_mm` is not a
    /// finite number greater than zero.
    pub fn new(pixels_per_mm: f64) -> Result<Self, EngineError> {
        if pixels_per_mm.is_finite() && pixels_per_mm > 0.0 {
            Ok(Self(pixels_per_mm))
        } else {
            Err(EngineError::invalid(format!(
                "scale must be a positive number, got {pixels_per_mm}"
            )))
        }
    }

    /// Scale from two points on a reference feature of known length,
    /// such as the ends of a micron marker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `distance_mm` is not
    /// positive or the points coincide.
    pub fn from_reference(p1: Point, p2: Point, distance_mm: f64) -> Result<Self, EngineError> {
        if !(distance_mm.is_finite() && distance_mm > 0.0) {
            return Err(EngineError::invalid(format!(
                "reference distance must be positive, got {distance_mm}"
            )));
        }
        let pixels = p1.distance(p2);
        if pixels <= f64::EPSILON {
            return Err(EngineError::invalid("reference points coincide"));
        }
        Self::new(pixels / distance_mm)
    }

    /// Scale from a microscope's microns-per-pixel rating.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `microns` is not positive.
    pub fn from_microns_per_pixel(microns: f64) -> Result<Self, EngineError> {
        if !(microns.is_finite() && microns > 0.0) {
            return Err(EngineError::invalid(format!(
                "microns per pixel must be positive, got {microns}"
            )));
        }
        Self::new(1000.0 / microns)
    }

    /// Pixels per millimetre.
    #[must_use]
    pub const fn pixels_per_mm(self) -> f64 {
        self.0
    }

    /// Convert a pixel length to millimetres.
    #[must_use]
    pub fn px_to_mm(self, pixels: f64) -> f64 {
        pixels / self.0
    }

    /// Convert a pixel area to square millimetres.
    #[must_use]
    pub fn px2_to_mm2(self, pixels: f64) -> f64 {
        pixels / (self.0 * self.0)
    }

    /// Convert a length in millimetres to pixels.
    #[must_use]
    pub fn mm_to_px(self, mm: f64) -> f64 {
        mm * self.0
    }
}

impl TryFrom<f64> for Scale {
    type Error = EngineError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Scale> for f64 {
    fn from(scale: Scale) -> Self {
        scale.0
    }
}

impl FromStr for Scale {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| EngineError::invalid(format!("scale is not a number: {s:?}")))?;
        Self::new(value)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} px/mm", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(Scale::new(bad), Err(EngineError::InvalidInput(_))), "{bad}");
        }
        assert_relative_eq!(Scale::new(100.0).unwrap().pixels_per_mm(), 100.0);
    }

    #[test]
    fn parses_from_text() {
        assert_relative_eq!("  250.5 ".parse::<Scale>().unwrap().pixels_per_mm(), 250.5);
        assert!(matches!("abc".parse::<Scale>(), Err(EngineError::InvalidInput(_))));
        assert!(matches!("-3".parse::<Scale>(), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn reference_marker() {
        let s = Scale::from_reference(Point::new(10.0, 10.0), Point::new(40.0, 50.0), 0.5).unwrap();
        assert_relative_eq!(s.pixels_per_mm(), 100.0);
        assert!(Scale::from_reference(Point::new(1.0, 1.0), Point::new(1.0, 1.0), 1.0).is_err());
        assert!(Scale::from_reference(Point::new(0.0, 0.0), Point::new(1.0, 1.0), 0.0).is_err());
    }

    #[test]
    fn microns_per_pixel() {
        let s = Scale::from_microns_per_pixel(2.0).unwrap();
        assert_relative_eq!(s.pixels_per_mm(), 500.0);
        assert!(Scale::from_microns_per_pixel(0.0).is_err());
    }

    #[test]
    fn unit_conversions() {
        let s = Scale::new(100.0).unwrap();
        assert_relative_eq!(s.px_to_mm(1000.0), 10.0);
        assert_relative_eq!(s.px2_to_mm2(1_000_000.0), 100.0);
        assert_relative_eq!(s.mm_to_px(0.25), 25.0);
    }

    #[test]
    fn serde_validates_on_load() {
        let s: Scale = serde_json::from_str("42.0").unwrap();
        assert_relative_eq!(s.pixels_per_mm(), 42.0);
        assert!(serde_json::from_str::<Scale>("0.0").is_err());
        assert_eq!(serde_json::to_string(&s).unwrap(), "42.0");
    }
}
