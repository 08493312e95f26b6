//! JSON persistence of the calibration artifact.

use calib_measure_core::{DistortionCoefficients, IntrinsicMatrix};
use calib_measure_intrinsics::CalibrationResult;
use log::info;
use serde::{de::Error as _, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("camera is not calibrated: no calibration artifact at {}", .0.display())]
    NotCalibrated(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Everything the measurement stage needs from a calibration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    /// Intrinsic matrix, row-major.
    pub camera_matrix: [f64; 9],
    /// `k1, k2, p1, p2, k3`.
    pub dist_coeffs: [f64; 5],
    pub image_width: u32,
    pub image_height: u32,
    pub rms_reprojection_error: f64,
    pub num_views: usize,
}

impl CalibrationArtifact {
    pub fn from_result(result: &CalibrationResult) -> Self {
        Self {
            camera_matrix: result.camera.intrinsics.to_row_major(),
            dist_coeffs: result.camera.distortion.to_array(),
            image_width: result.image_size.0,
            image_height: result.image_size.1,
            rms_reprojection_error: result.rms_error,
            num_views: result.poses.len(),
        }
    }

    /// Intrinsics, or `None` if `camera_matrix` is not a zero-skew pinhole matrix.
    pub fn intrinsics(&self) -> Option<IntrinsicMatrix> {
        IntrinsicMatrix::from_row_major(self.camera_matrix)
    }

    pub fn distortion(&self) -> DistortionCoefficients {
        DistortionCoefficients::from_array(self.dist_coeffs)
    }

    /// Focal length along `x`, in pixels.
    pub fn fx(&self) -> f64 {
        self.camera_matrix[0]
    }
}

/// File-backed store for a single [`CalibrationArtifact`].
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the artifact as pretty JSON, creating parent directories.
    pub fn save(&self, artifact: &CalibrationArtifact) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&self.path, json)?;
        info!("calibration artifact saved to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<CalibrationArtifact, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NotCalibrated(self.path.clone()));
        }
        let raw = fs::read_to_string(&self.path)?;
        let artifact: CalibrationArtifact = serde_json::from_str(&raw)?;
        if artifact.intrinsics().is_none() {
            return Err(StoreError::Json(serde_json::Error::custom(
                "camera_matrix is not a zero-skew pinhole matrix",
            )));
        }
        Ok(artifact)
    }
}
