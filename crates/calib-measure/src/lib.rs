//! Planar checkerboard calibration and monocular width measurement.
//!
//! The workflow has two stages connected only through a JSON calibration
//! artifact:
//!
//! 1. **calibration**: detect the inner corners of a checkerboard in every
//!    image of a directory, solve intrinsics and Brown–Conrady distortion,
//!    and save the artifact ([`pipeline::run_calibration`]);
//! 2. **measurement**: load the artifact, find the object's pixel width in a
//!    photograph and convert it to a physical width with `w * d / fx`
//!    ([`pipeline::run_measurement`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_measure::{pipeline, LargestEdgeRegionLocator, PipelineConfig};
//! use calib_measure::chessboard::ChessboardDetector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load_json("calib_measure.json")?;
//! let detector = ChessboardDetector::new(config.detector.clone());
//! let run = pipeline::run_calibration(&config, &detector)?;
//! println!("rms = {:.3} px", run.artifact.rms_reprojection_error);
//!
//! let locator = LargestEdgeRegionLocator::new(config.locator.clone());
//! let measured = pipeline::run_measurement(&config, &locator, None)?;
//! println!("width = {:.2}", measured.measurement.estimated_width);
//! # Ok(())
//! # }
//! ```
//!
//! ## Measurement model
//!
//! The estimate assumes the object is fronto-parallel to the image plane and
//! that `d` is measured along the optical axis. No tilt or off-axis
//! correction is applied; the result carries the unit of `d`.
//!
//! ## API map
//! - `calib_measure::core`: geometry types, board pattern, camera model.
//! - `calib_measure::chessboard`: ordered checkerboard corner detection.
//! - `calib_measure::intrinsics`: Zhang + Levenberg–Marquardt calibration.

pub use calib_measure_chessboard as chessboard;
pub use calib_measure_core as core;
pub use calib_measure_intrinsics as intrinsics;

pub mod config;
pub mod detect;
pub mod error;
pub mod locate;
pub mod metric;
pub mod pipeline;
pub mod store;

pub use config::{ConfigError, PipelineConfig};
pub use error::{PipelineError, Stage};
pub use locate::{
    BoundingBox, EdgeLocatorParams, LargestEdgeRegionLocator, LocateError, ObjectLocator,
};
pub use metric::{MeasureError, MeasurementResult, MetricEstimator};
pub use store::{CalibrationArtifact, CalibrationStore, StoreError};
