use calib_measure_core::CorrespondenceError;

/// Per-image detection failures. None of these abort a calibration run.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("invalid grayscale image ({width}x{height})")]
    InvalidImage { width: usize, height: usize },
    #[error("not enough corner candidates (found {found}, need {required})")]
    NotEnoughCorners { found: usize, required: usize },
    #[error("no connected corner grid of the expected size (largest component has {largest} corners, need {required})")]
    GridNotFound { largest: usize, required: usize },
    #[error("grid is {found_cols}x{found_rows}, expected {cols}x{rows}")]
    GridSizeMismatch {
        cols: u32,
        rows: u32,
        found_cols: u32,
        found_rows: u32,
    },
    #[error(transparent)]
    Correspondence(#[from] CorrespondenceError),
}
