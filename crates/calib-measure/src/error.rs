use crate::{ConfigError, LocateError, MeasureError, StoreError};
use calib_measure_intrinsics::CalibrationError;
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Calibration,
    Measurement,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Calibration => f.write_str("calibration"),
            Stage::Measurement => f.write_str("measurement"),
        }
    }
}

/// Fatal pipeline errors, labelled with the stage that raised them.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("calibration: cannot read image directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("calibration: no calibration images found in {}", .0.display())]
    NoImagesFound(PathBuf),
    #[error("calibration: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("{stage}: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },
    #[error("measurement: cannot read object image {}: {reason}", .path.display())]
    ObjectImageUnreadable { path: PathBuf, reason: String },
    #[error("measurement: {0}")]
    Measure(#[from] MeasureError),
    #[error("measurement: {0}")]
    Locate(#[from] LocateError),
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Config(_) => None,
            PipelineError::ReadDir { .. }
            | PipelineError::NoImagesFound(_)
            | PipelineError::Calibration(_) => Some(Stage::Calibration),
            PipelineError::Store { stage, .. } => Some(*stage),
            PipelineError::ObjectImageUnreadable { .. }
            | PipelineError::Measure(_)
            | PipelineError::Locate(_) => Some(Stage::Measurement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_stage_prefix() {
        let err = PipelineError::from(CalibrationError::InsufficientCalibrationData {
            found: 3,
            required: 10,
        });
        assert_eq!(
            err.to_string(),
            "calibration: insufficient calibration data: 3 valid views, need at least 10"
        );

        let err = PipelineError::Store {
            stage: Stage::Measurement,
            source: StoreError::NotCalibrated(PathBuf::from("calibration_data.json")),
        };
        assert!(err.to_string().starts_with("measurement: camera is not calibrated"));
        assert_eq!(err.stage(), Some(Stage::Measurement));

        let err = PipelineError::from(LocateError::NoObjectDetected);
        assert_eq!(err.to_string(), "measurement: no object detected in the image");
    }
}
