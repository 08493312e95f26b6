//! Core types for planar checkerboard calibration and pinhole measurement.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, solver or image decoder.
//!
//! Conventions:
//! - board points live on the `z = 0` plane, in the physical unit of the
//!   square size (millimeters by default);
//! - image points are pixel coordinates with the origin at the top-left
//!   pixel, `x` to the right and `y` down;
//! - board grids are traversed row-major: index `k = j * cols + i`.

mod camera;
mod corner;
mod correspondence;
mod homography;
mod image;
mod logger;
mod pattern;

pub use camera::{DistortionCoefficients, ExtrinsicPose, IntrinsicMatrix, PinholeCamera};
pub use corner::{Corner, GridCoords};
pub use correspondence::{CorrespondenceError, CorrespondenceSet};
pub use homography::{estimate_homography, Homography};
pub use image::{GrayImage, GrayImageView};
pub use pattern::{BoardSpec, BoardSpecError, ImagePoint2D, ObjectPoint3D};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
