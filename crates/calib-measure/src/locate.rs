//! Pixel bounding box of the object to be measured.

use calib_measure_core::GrayImageView;
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    #[error("no object detected in the image")]
    NoObjectDetected,
}

/// Axis-aligned pixel box around the object's outermost edge pixels.
///
/// `width` and `height` are edge-to-edge distances (`max - min`), so a step
/// edge on each side of an object `n` pixels wide gives `width == n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Finds the object to be measured in a grayscale image.
pub trait ObjectLocator {
    fn locate(&self, image: &GrayImageView<'_>) -> Result<BoundingBox, LocateError>;
}

/// Canny-style edge settings. Magnitudes are `|gx| + |gy|` of the 3x3 Sobel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeLocatorParams {
    /// Weak edges are kept only when connected to a strong one.
    pub low_threshold: f32,
    /// Edges at or above this magnitude seed the hysteresis.
    pub high_threshold: f32,
    /// Components with fewer edge pixels are ignored.
    pub min_component_pixels: usize,
}

impl Default for EdgeLocatorParams {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            min_component_pixels: 4,
        }
    }
}

/// Thinned Canny edges, 8-connected edge regions, largest bounding box wins.
#[derive(Clone, Debug, Default)]
pub struct LargestEdgeRegionLocator {
    pub params: EdgeLocatorParams,
}

impl LargestEdgeRegionLocator {
    pub fn new(params: EdgeLocatorParams) -> Self {
        Self { params }
    }
}

struct Gradients {
    gx: Vec<f32>,
    gy: Vec<f32>,
    magnitude: Vec<f32>,
}

/// Sobel gradients; the one-pixel image border stays zero.
fn sobel(img: &GrayImageView<'_>) -> Gradients {
    let (w, h) = (img.width, img.height);
    let mut out = Gradients {
        gx: vec![0.0; w * h],
        gy: vec![0.0; w * h],
        magnitude: vec![0.0; w * h],
    };
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p = |dx: usize, dy: usize| img.get(x + dx - 1, y + dy - 1) as f32;
            let gx = (p(2, 0) + 2.0 * p(2, 1) + p(2, 2)) - (p(0, 0) + 2.0 * p(0, 1) + p(0, 2));
            let gy = (p(0, 2) + 2.0 * p(1, 2) + p(2, 2)) - (p(0, 0) + 2.0 * p(1, 0) + p(2, 0));
            let idx = y * w + x;
            out.gx[idx] = gx;
            out.gy[idx] = gy;
            out.magnitude[idx] = gx.abs() + gy.abs();
        }
    }
    out
}

/// Neighbor offsets across the edge for a gradient quantized to 0°, 45°,
/// 90° or 135°.
fn across_edge(gx: f32, gy: f32) -> [(isize, isize); 2] {
    const TAN_22_5: f32 = 0.414_213_57;
    const TAN_67_5: f32 = 2.414_213_6;
    let (ax, ay) = (gx.abs(), gy.abs());
    if ay <= TAN_22_5 * ax {
        [(-1, 0), (1, 0)]
    } else if ay >= TAN_67_5 * ax {
        [(0, -1), (0, 1)]
    } else if (gx > 0.0) == (gy > 0.0) {
        [(-1, -1), (1, 1)]
    } else {
        [(1, -1), (-1, 1)]
    }
}

/// Non-maximum suppression followed by hysteresis thresholding.
///
/// On a plateau of equal magnitudes across the edge the pixel on the
/// negative side wins, so a step edge leaves a single pixel.
fn canny_edges(img: &GrayImageView<'_>, low: f32, high: f32) -> Vec<bool> {
    let (w, h) = (img.width, img.height);
    if w < 3 || h < 3 {
        return vec![false; w * h];
    }
    let grad = sobel(img);
    let mut thin = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let m = grad.magnitude[idx];
            if m < low {
                continue;
            }
            let [before, after] = across_edge(grad.gx[idx], grad.gy[idx]);
            let at = |(dx, dy): (isize, isize)| {
                let nx = x.wrapping_add_signed(dx);
                let ny = y.wrapping_add_signed(dy);
                grad.magnitude[ny * w + nx]
            };
            if m > at(before) && m >= at(after) {
                thin[idx] = m;
            }
        }
    }

    let mut edges = vec![false; w * h];
    let mut stack: Vec<usize> = (0..w * h).filter(|&i| thin[i] >= high).collect();
    for &i in &stack {
        edges[i] = true;
    }
    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % w, idx / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let n = ny * w + nx;
                if !edges[n] && thin[n] >= low {
                    edges[n] = true;
                    stack.push(n);
                }
            }
        }
    }
    edges
}

impl ObjectLocator for LargestEdgeRegionLocator {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    fn locate(&self, image: &GrayImageView<'_>) -> Result<BoundingBox, LocateError> {
        let (w, h) = (image.width, image.height);
        let params = &self.params;
        let mut mask = canny_edges(image, params.low_threshold, params.high_threshold);

        let mut best: Option<BoundingBox> = None;
        let mut stack = Vec::new();
        for start in 0..mask.len() {
            if !mask[start] {
                continue;
            }
            mask[start] = false;
            stack.push(start);

            let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0usize, 0usize);
            let mut pixels = 0usize;
            while let Some(idx) = stack.pop() {
                let (x, y) = (idx % w, idx / w);
                pixels += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        let n = ny * w + nx;
                        if mask[n] {
                            mask[n] = false;
                            stack.push(n);
                        }
                    }
                }
            }

            if pixels < params.min_component_pixels {
                continue;
            }
            let bbox = BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x) as u32,
                height: (max_y - min_y) as u32,
            };
            if best.is_none_or(|b| bbox.area() > b.area()) {
                best = Some(bbox);
            }
        }

        let bbox = best.ok_or(LocateError::NoObjectDetected)?;
        debug!(
            "object box at ({}, {}) size {}x{}",
            bbox.x, bbox.y, bbox.width, bbox.height
        );
        Ok(bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_measure_core::GrayImage;

    fn rect_image(w: usize, h: usize, rects: &[(usize, usize, usize, usize)]) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside = rects
                .iter()
                .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
            if inside {
                220
            } else {
                30
            }
        })
    }

    #[test]
    fn finds_rectangle_width() {
        let img = rect_image(200, 120, &[(40, 30, 80, 50)]);
        let bbox = LargestEdgeRegionLocator::default()
            .locate(&img.view())
            .expect("object");
        assert_eq!((bbox.width, bbox.height), (80, 50));
        assert_eq!((bbox.x, bbox.y), (39, 29));
    }

    #[test]
    fn largest_region_wins() {
        let img = rect_image(300, 200, &[(10, 10, 20, 20), (100, 60, 120, 90)]);
        let bbox = LargestEdgeRegionLocator::default()
            .locate(&img.view())
            .expect("object");
        assert_eq!((bbox.width, bbox.height), (120, 90));
    }

    #[test]
    fn width_matches_object_at_any_size() {
        for width in [40, 80, 160] {
            let img = rect_image(240, 100, &[(30, 20, width, 60)]);
            let bbox = LargestEdgeRegionLocator::default()
                .locate(&img.view())
                .expect("object");
            assert_eq!(bbox.width as usize, width);
        }
    }

    #[test]
    fn step_edge_is_one_pixel_wide() {
        let img = rect_image(40, 20, &[(20, 0, 20, 20)]);
        let edges = canny_edges(&img.view(), 50.0, 150.0);
        for y in 1..19 {
            let row: Vec<usize> = (0..40).filter(|&x| edges[y * 40 + x]).collect();
            assert_eq!(row, [19], "row {y}");
        }
    }

    #[test]
    fn weak_edges_need_a_strong_neighbor() {
        // Contrast 20 gives magnitude 80: above `low`, below `high`.
        let faint = GrayImage::from_fn(60, 40, |x, y| {
            if (20..40).contains(&x) && (10..30).contains(&y) {
                50
            } else {
                30
            }
        });
        let err = LargestEdgeRegionLocator::default()
            .locate(&faint.view())
            .expect_err("faint object");
        assert_eq!(err, LocateError::NoObjectDetected);
    }

    #[test]
    fn flat_image_has_no_object() {
        let img = GrayImage::from_fn(64, 48, |_, _| 128);
        let err = LargestEdgeRegionLocator::default()
            .locate(&img.view())
            .expect_err("flat");
        assert_eq!(err, LocateError::NoObjectDetected);
    }

    #[test]
    fn tiny_image_has_no_object() {
        let img = GrayImage::from_fn(2, 2, |x, _| if x == 0 { 0 } else { 255 });
        assert!(LargestEdgeRegionLocator::default()
            .locate(&img.view())
            .is_err());
    }
}
