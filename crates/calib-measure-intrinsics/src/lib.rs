//! Intrinsic calibration of a pinhole camera from planar checkerboard views.
//!
//! The calibrator follows the classic two-stage scheme:
//! 1. a per-view DLT homography and Zhang's closed-form intrinsics
//!    (zero skew), followed by a planar pose per view;
//! 2. joint Levenberg–Marquardt refinement of intrinsics, Brown–Conrady
//!    distortion `(k1, k2, p1, p2, k3)` and all poses, minimizing pixel
//!    reprojection error.
//!
//! ```no_run
//! use calib_measure_intrinsics::{CalibrationOptions, IntrinsicCalibrator};
//! # fn views() -> Vec<calib_measure_core::CorrespondenceSet> { Vec::new() }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let calibrator = IntrinsicCalibrator::new(CalibrationOptions::default());
//! let result = calibrator.calibrate(views(), (1280, 720))?;
//! println!("fx = {:.2}, rms = {:.3} px", result.camera.intrinsics.fx, result.rms_error);
//! # Ok(())
//! # }
//! ```

mod calibrator;
mod error;
mod lm;
mod planar_pose;
mod zhang;

pub use calibrator::{CalibrationOptions, CalibrationResult, IntrinsicCalibrator};
pub use error::CalibrationError;
pub use lm::{LeastSquaresProblem, LevenbergMarquardt, SolverError, SolverReport, TerminationReason};
pub use planar_pose::pose_from_homography;
pub use zhang::zhang_intrinsics;
