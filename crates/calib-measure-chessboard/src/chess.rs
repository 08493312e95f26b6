//! Adapter around the `chess-corners` ChESS detector.

use crate::DetectError;
use calib_measure_core::{Corner, GrayImage};
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor, ThresholdMode};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Single-scale ChESS settings used by the chessboard detector.
pub fn default_chess_config(threshold_rel: f32) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = threshold_rel;
    cfg.nms_radius = 2;
    cfg
}

/// Detect raw ChESS corners and adapt them into [`Corner`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, cfg), fields(width = img.width, height = img.height))
)]
pub fn detect_raw_corners(img: &GrayImage, cfg: &ChessConfig) -> Result<Vec<Corner>, DetectError> {
    let invalid = DetectError::InvalidImage {
        width: img.width,
        height: img.height,
    };
    let (Ok(w), Ok(h)) = (u32::try_from(img.width), u32::try_from(img.height)) else {
        return Err(invalid);
    };
    let buf = ::image::GrayImage::from_raw(w, h, img.data.clone()).ok_or(invalid.clone())?;
    Ok(find_chess_corners_image(&buf, cfg)
        .map_err(|_| invalid)?
        .iter()
        .map(adapt_chess_corner)
        .collect())
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        strength: c.response,
    }
}
