//! Glue between `image` buffers and the detector crates.

use calib_measure_chessboard::{detect_correspondences, CornerDetector, DetectError};
use calib_measure_core::{BoardSpec, CorrespondenceSet, GrayImageView, ObjectPoint3D};
use image::{GrayImage, ImageReader};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Borrow an `image::GrayImage` as the core view type.
pub fn gray_view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported image file to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage, image::ImageError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?.to_luma8())
}

/// Detect the board in a decoded image and pair it with `object_points`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, detector, board, object_points),
        fields(width = img.width(), height = img.height())
    )
)]
pub fn detect_board<D: CornerDetector + ?Sized>(
    img: &GrayImage,
    detector: &D,
    board: &BoardSpec,
    object_points: &[ObjectPoint3D],
) -> Result<CorrespondenceSet, DetectError> {
    detect_correspondences(detector, &gray_view(img), board, object_points)
}
