/// Fatal calibration failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("insufficient calibration data: {found} valid views, need at least {required}")]
    InsufficientCalibrationData { found: usize, required: usize },
    #[error("degenerate view geometry: {0}")]
    DegenerateGeometry(String),
}
