//! Lighting-invariant preprocessing: local-contrast normalization and
//! adaptive thresholding.

use calib_measure_core::{GrayImage, GrayImageView};
use nalgebra::Point2;

/// Summed-area tables of intensity and squared intensity.
struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImage {
    fn new(src: &GrayImageView<'_>) -> Self {
        let stride = src.width + 1;
        let mut sum = vec![0u64; stride * (src.height + 1)];
        let mut sum_sq = vec![0u64; stride * (src.height + 1)];
        for y in 0..src.height {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..src.width {
                let v = src.get(x, y) as u64;
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }
        Self {
            width: src.width,
            height: src.height,
            sum,
            sum_sq,
        }
    }

    /// Mean and variance over the window of half-size `radius` clipped to the image.
    fn window_stats(&self, x: usize, y: usize, radius: usize) -> (f32, f32) {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(self.width);
        let y1 = (y + radius + 1).min(self.height);
        let stride = self.width + 1;
        let area = ((x1 - x0) * (y1 - y0)) as f64;

        let rect = |t: &[u64]| {
            (t[y1 * stride + x1] + t[y0 * stride + x0]) as f64
                - (t[y0 * stride + x1] + t[y1 * stride + x0]) as f64
        };
        let mean = rect(&self.sum) / area;
        let var = (rect(&self.sum_sq) / area - mean * mean).max(0.0);
        (mean as f32, var as f32)
    }
}

/// Re-map every pixel by the mean and standard deviation of its window.
///
/// Output is `128 + 64 * (I - mean) / max(stddev, min_stddev)`, clamped to u8,
/// so a global brightness ramp or a shadow over part of the board maps to the
/// same contrast range.
pub fn normalize_local_contrast(
    src: &GrayImageView<'_>,
    radius: usize,
    min_stddev: f32,
) -> GrayImage {
    let integral = IntegralImage::new(src);
    let floor = min_stddev.max(1e-3);
    GrayImage::from_fn(src.width, src.height, |x, y| {
        let (mean, var) = integral.window_stats(x, y, radius);
        let z = (src.get(x, y) as f32 - mean) / var.sqrt().max(floor);
        (128.0 + 64.0 * z).round().clamp(0.0, 255.0) as u8
    })
}

/// Binarize against the local window mean: `255` if `I > mean - offset`, else `0`.
pub fn adaptive_threshold(src: &GrayImageView<'_>, radius: usize, offset: f32) -> GrayImage {
    let integral = IntegralImage::new(src);
    GrayImage::from_fn(src.width, src.height, |x, y| {
        let (mean, _) = integral.window_stats(x, y, radius);
        if src.get(x, y) as f32 > mean - offset {
            255
        } else {
            0
        }
    })
}

/// Whether `p` looks like a checkerboard X-junction in a binary image.
///
/// Samples `samples` points on a ring of `radius` pixels and counts
/// black/white transitions around it; an inner board corner has exactly four.
/// Rings that leave the image are rejected.
pub fn is_x_junction(
    binary: &GrayImageView<'_>,
    p: Point2<f32>,
    radius: f32,
    samples: usize,
) -> bool {
    if samples < 8 {
        return false;
    }
    let mut ring = Vec::with_capacity(samples);
    for k in 0..samples {
        let a = k as f32 * std::f32::consts::TAU / samples as f32;
        let x = (p.x + radius * a.cos()).round() as i32;
        let y = (p.y + radius * a.sin()).round() as i32;
        if x < 0 || y < 0 || x >= binary.width as i32 || y >= binary.height as i32 {
            return false;
        }
        ring.push(binary.get_or_zero(x, y) > 127);
    }
    let transitions = (0..samples)
        .filter(|&k| ring[k] != ring[(k + 1) % samples])
        .count();
    transitions == 4
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned checkerboard with `square` px squares, dark=`lo`, light=`hi`.
    fn checker(width: usize, height: usize, square: usize, lo: u8, hi: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if ((x / square) + (y / square)) % 2 == 0 {
                hi
            } else {
                lo
            }
        })
    }

    #[test]
    fn normalization_equalizes_contrast_under_a_gradient() {
        // Same pattern, left half dim and low-contrast, right half bright.
        let img = GrayImage::from_fn(80, 40, |x, y| {
            let dark = ((x / 10) + (y / 10)) % 2 == 1;
            match (x < 40, dark) {
                (true, true) => 20,
                (true, false) => 50,
                (false, true) => 150,
                (false, false) => 250,
            }
        });
        let out = normalize_local_contrast(&img.view(), 8, 4.0);
        let view = out.view();

        // Centre of a light and a dark square on each half.
        let (l_light, l_dark) = (view.get(15, 15) as i32, view.get(5, 15) as i32);
        let (r_light, r_dark) = (view.get(55, 15) as i32, view.get(65, 15) as i32);
        assert!(l_light > 128 && l_dark < 128, "left {l_light} {l_dark}");
        assert!(r_light > 128 && r_dark < 128, "right {r_light} {r_dark}");
        assert!(((l_light - l_dark) - (r_light - r_dark)).abs() < 40);
    }

    #[test]
    fn flat_image_normalizes_to_mid_gray() {
        let img = GrayImage::from_fn(20, 20, |_, _| 77);
        let out = normalize_local_contrast(&img.view(), 5, 4.0);
        assert!(out.data.iter().all(|&v| v == 128));
    }

    #[test]
    fn adaptive_threshold_splits_squares() {
        let img = checker(40, 40, 10, 30, 200);
        let bin = adaptive_threshold(&img.view(), 6, 5.0);
        let view = bin.view();
        assert_eq!(view.get(5, 5), 255);
        assert_eq!(view.get(15, 5), 0);
        assert_eq!(view.get(15, 15), 255);
    }

    #[test]
    fn detects_x_junction_at_inner_corner_only() {
        let img = checker(40, 40, 10, 0, 255);
        let bin = adaptive_threshold(&img.view(), 6, 5.0);
        let view = bin.view();

        // Pixel (10,10) starts a new square: the junction sits at 9.5.
        assert!(is_x_junction(&view, Point2::new(9.5, 9.5), 4.0, 16));
        // Middle of a square and middle of an edge.
        assert!(!is_x_junction(&view, Point2::new(5.0, 5.0), 3.0, 16));
        assert!(!is_x_junction(&view, Point2::new(9.5, 5.0), 3.0, 16));
        // Ring leaves the image.
        assert!(!is_x_junction(&view, Point2::new(1.0, 1.0), 4.0, 16));
    }
}
