//! JSON configuration of the calibration and measurement stages.

use crate::locate::EdgeLocatorParams;
use calib_measure_chessboard::ChessboardParams;
use calib_measure_core::{BoardSpec, BoardSpecError};
use calib_measure_intrinsics::CalibrationOptions;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardSpecError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_board() -> BoardSpec {
    BoardSpec {
        cols: 7,
        rows: 9,
        square_size: 18.0,
    }
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("calibration_images")
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("calibration_data.json")
}

fn default_object_image() -> PathBuf {
    PathBuf::from("object_images/object.jpeg")
}

fn default_distance() -> f64 {
    210.0
}

fn default_actual_width() -> f64 {
    21.0
}

/// Settings of both pipeline stages. Every field has a default, so `{}` is a
/// valid configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Inner-corner counts and square size (millimeters).
    #[serde(default = "default_board")]
    pub board: BoardSpec,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    #[serde(default = "default_object_image")]
    pub object_image: PathBuf,
    /// Camera-to-object distance along the optical axis. The estimated width
    /// is reported in this unit.
    #[serde(default = "default_distance")]
    pub distance: f64,
    /// Ground-truth width of the object, same unit as `distance`.
    #[serde(default = "default_actual_width")]
    pub actual_width: f64,
    /// Pixel width to use instead of locating the object in `object_image`.
    #[serde(default)]
    pub pixel_width: Option<f64>,
    #[serde(default)]
    pub calibration: CalibrationOptions,
    #[serde(default)]
    pub detector: ChessboardParams,
    #[serde(default)]
    pub locator: EdgeLocatorParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            board: default_board(),
            images_dir: default_images_dir(),
            artifact_path: default_artifact_path(),
            object_image: default_object_image(),
            distance: default_distance(),
            actual_width: default_actual_width(),
            pixel_width: None,
            calibration: CalibrationOptions::default(),
            detector: ChessboardParams::default(),
            locator: EdgeLocatorParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        if self.calibration.min_views == 0 {
            return Err(ConfigError::Invalid("calibration.min_views must be > 0".into()));
        }
        Ok(())
    }
}
