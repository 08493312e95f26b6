//! Ordered checkerboard inner-corner detection.
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_measure_chessboard::{ChessboardDetector, ChessboardParams, CornerDetector};
//! use calib_measure_core::{BoardSpec, GrayImage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let board = BoardSpec::new(7, 9, 18.0)?;
//! let img = GrayImage::new(640, 480);
//! let detector = ChessboardDetector::new(ChessboardParams::default());
//! let detection = detector.detect(&img.view(), &board)?;
//! println!("found {} corners", detection.points.len());
//! # Ok(())
//! # }
//! ```
//!
//! Pipeline:
//! 1. Local-contrast normalization of the input (mean/stddev per window).
//! 2. ChESS corner responses on the normalized image (`chess-corners`).
//! 3. Adaptive-threshold binarization; candidates that are not X-junctions in
//!    the binary image are dropped.
//! 4. Mutual nearest-neighbor grid graph (k-d tree), 4-connected.
//! 5. BFS labelling with locally tracked grid axes (rotation invariant).
//! 6. Keep the component matching the board size and re-label it into the
//!    canonical row-major order described by [`CornerDetector`].

mod chess;
mod detector;
mod error;
mod gridgraph;
mod params;
mod preprocess;

pub use chess::{default_chess_config, detect_raw_corners};
pub use detector::{detect_correspondences, ChessboardDetector, CornerDetector, GridDetection};
pub use error::DetectError;
pub use gridgraph::{assign_grid_coordinates, connected_components, GridGraph, NodeNeighbor};
pub use params::{ChessboardParams, GridGraphParams, JunctionParams, PreprocessParams};
pub use preprocess::{adaptive_threshold, is_x_junction, normalize_local_contrast};
