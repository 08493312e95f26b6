//! Pinhole width estimation.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("invalid measurement input: {0}")]
    InvalidInput(String),
}

/// Estimated and ground-truth width of the measured object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub estimated_width: f64,
    pub actual_width: f64,
    /// `|estimated - actual| / actual * 100`.
    pub percent_error: f64,
}

/// Converts pixel widths to physical widths with the pinhole relation
/// `W = w * d / fx`.
///
/// The object is assumed fronto-parallel and `d` is the distance along the
/// optical axis. The estimate is in the unit of `d`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricEstimator {
    fx: f64,
}

impl MetricEstimator {
    pub fn new(fx: f64) -> Result<Self, MeasureError> {
        if !(fx.is_finite() && fx > 0.0) {
            return Err(MeasureError::InvalidInput(format!(
                "focal length must be positive, got {fx}"
            )));
        }
        Ok(Self { fx })
    }

    pub fn fx(&self) -> f64 {
        self.fx
    }

    pub fn estimate_width(&self, pixel_width: f64, distance: f64) -> Result<f64, MeasureError> {
        if !(pixel_width.is_finite() && pixel_width >= 0.0) {
            return Err(MeasureError::InvalidInput(format!(
                "pixel width must be non-negative, got {pixel_width}"
            )));
        }
        if !(distance.is_finite() && distance > 0.0) {
            return Err(MeasureError::InvalidInput(format!(
                "distance must be positive, got {distance}"
            )));
        }
        Ok(pixel_width * distance / self.fx)
    }

    /// Estimate the width and compare it with the known `actual_width`.
    pub fn measure(
        &self,
        pixel_width: f64,
        distance: f64,
        actual_width: f64,
    ) -> Result<MeasurementResult, MeasureError> {
        if !(actual_width.is_finite() && actual_width > 0.0) {
            return Err(MeasureError::InvalidInput(format!(
                "actual width must be positive, got {actual_width}"
            )));
        }
        let estimated_width = self.estimate_width(pixel_width, distance)?;
        Ok(MeasurementResult {
            estimated_width,
            actual_width,
            percent_error: (estimated_width - actual_width).abs() * 100.0 / actual_width,
        })
    }
}
