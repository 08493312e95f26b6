//! Calibration and measurement stage drivers.
//!
//! The stages share nothing but the [`CalibrationStore`]: calibration writes
//! the artifact only after a successful solve, measurement only reads it.

use crate::detect::{detect_board, gray_view, load_gray};
use crate::{
    BoundingBox, CalibrationArtifact, CalibrationStore, MeasurementResult, MetricEstimator,
    ObjectLocator, PipelineConfig, PipelineError, Stage,
};
use calib_measure_chessboard::{CornerDetector, DetectError};
use calib_measure_intrinsics::{CalibrationResult, IntrinsicCalibrator};
use log::{info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// File extensions accepted as calibration images (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Outcome of one calibration image.
#[derive(Debug)]
pub enum ImageStatus {
    Detected { corners: usize },
    NotDetected(DetectError),
    Unreadable(String),
    SizeMismatch { expected: (u32, u32), found: (u32, u32) },
}

#[derive(Debug)]
pub struct ImageReport {
    pub path: PathBuf,
    pub status: ImageStatus,
}

impl ImageReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, ImageStatus::Detected { .. })
    }
}

impl fmt::Display for ImageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match &self.status {
            ImageStatus::Detected { corners } => {
                write!(f, "[OK] {corners} corners detected in {path}")
            }
            ImageStatus::NotDetected(err) => {
                write!(f, "[FAIL] no corners detected in {path}: {err}")
            }
            ImageStatus::Unreadable(reason) => {
                write!(f, "[FAIL] could not read {path}: {reason}")
            }
            ImageStatus::SizeMismatch { expected, found } => write!(
                f,
                "[FAIL] {path} is {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

/// Successful calibration stage.
#[derive(Debug)]
pub struct CalibrationRun {
    pub images: Vec<ImageReport>,
    pub result: CalibrationResult,
    pub artifact: CalibrationArtifact,
}

/// Successful measurement stage.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementRun {
    pub fx: f64,
    /// Located object box; `None` when the pixel width was given explicitly.
    pub bbox: Option<BoundingBox>,
    pub pixel_width: f64,
    pub measurement: MeasurementResult,
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Image files directly inside `dir`, in sorted path order.
pub fn list_calibration_images(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|source| PipelineError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| PipelineError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Run the calibration stage. See [`run_calibration_with`].
pub fn run_calibration<D: CornerDetector + ?Sized>(
    config: &PipelineConfig,
    detector: &D,
) -> Result<CalibrationRun, PipelineError> {
    run_calibration_with(config, detector, |_| {})
}

/// Detect the board in every image of `config.images_dir`, calibrate, and
/// save the artifact to `config.artifact_path`.
///
/// `on_image` sees every per-image report as soon as it is known, including
/// when the stage later fails. Images that cannot be decoded, have a
/// different size than the first readable image, or have no complete board
/// are skipped.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(config, detector, on_image),
        fields(dir = %config.images_dir.display())
    )
)]
pub fn run_calibration_with<D, F>(
    config: &PipelineConfig,
    detector: &D,
    mut on_image: F,
) -> Result<CalibrationRun, PipelineError>
where
    D: CornerDetector + ?Sized,
    F: FnMut(&ImageReport),
{
    config.validate()?;
    let paths = list_calibration_images(&config.images_dir)?;
    if paths.is_empty() {
        return Err(PipelineError::NoImagesFound(config.images_dir.clone()));
    }
    info!("found {} calibration images", paths.len());

    let board = &config.board;
    let object_points = board.object_points();
    let mut image_size: Option<(u32, u32)> = None;
    let mut views = Vec::new();
    let mut images = Vec::with_capacity(paths.len());

    for path in paths {
        let status = match load_gray(&path) {
            Err(err) => ImageStatus::Unreadable(err.to_string()),
            Ok(img) => {
                let size = img.dimensions();
                match image_size {
                    Some(expected) if expected != size => ImageStatus::SizeMismatch {
                        expected,
                        found: size,
                    },
                    _ => {
                        image_size.get_or_insert(size);
                        match detect_board(&img, detector, board, &object_points) {
                            Ok(set) => {
                                let corners = set.len();
                                views.push(set);
                                ImageStatus::Detected { corners }
                            }
                            Err(err) => ImageStatus::NotDetected(err),
                        }
                    }
                }
            }
        };
        let report = ImageReport { path, status };
        if report.is_ok() {
            info!("{report}");
        } else {
            warn!("{report}");
        }
        on_image(&report);
        images.push(report);
    }

    info!("total valid calibration images: {}", views.len());
    let calibrator = IntrinsicCalibrator::new(config.calibration.clone());
    let result = calibrator.calibrate(views, image_size.unwrap_or((0, 0)))?;

    let artifact = CalibrationArtifact::from_result(&result);
    CalibrationStore::new(&config.artifact_path)
        .save(&artifact)
        .map_err(|source| PipelineError::Store {
            stage: Stage::Calibration,
            source,
        })?;

    Ok(CalibrationRun {
        images,
        result,
        artifact,
    })
}

/// Load the calibration artifact, find the object's pixel width and convert
/// it to a physical width.
///
/// `pixel_width` (or `config.pixel_width`) bypasses the locator.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(config, locator))
)]
pub fn run_measurement<L: ObjectLocator + ?Sized>(
    config: &PipelineConfig,
    locator: &L,
    pixel_width: Option<f64>,
) -> Result<MeasurementRun, PipelineError> {
    let artifact = CalibrationStore::new(&config.artifact_path)
        .load()
        .map_err(|source| PipelineError::Store {
            stage: Stage::Measurement,
            source,
        })?;
    let fx = artifact.fx();
    info!("focal length {fx:.3} px from {}", config.artifact_path.display());
    let estimator = MetricEstimator::new(fx)?;

    let (bbox, pixel_width) = match pixel_width.or(config.pixel_width) {
        Some(w) => (None, w),
        None => {
            let img = load_gray(&config.object_image).map_err(|err| {
                PipelineError::ObjectImageUnreadable {
                    path: config.object_image.clone(),
                    reason: err.to_string(),
                }
            })?;
            let bbox = locator.locate(&gray_view(&img))?;
            (Some(bbox), bbox.width as f64)
        }
    };

    let measurement = estimator.measure(pixel_width, config.distance, config.actual_width)?;
    Ok(MeasurementRun {
        fx,
        bbox,
        pixel_width,
        measurement,
    })
}
