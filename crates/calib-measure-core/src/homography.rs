use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

/// Plane-to-image projective map: `p_img ~ H * p_plane`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// Estimate H such that `img ~ H * plane` with the normalized DLT.
///
/// Needs at least 4 correspondences. Returns `None` for mismatched inputs or
/// when the solution cannot be normalized (degenerate point layout).
pub fn estimate_homography(
    plane_pts: &[Point2<f64>],
    img_pts: &[Point2<f64>],
) -> Option<Homography> {
    if plane_pts.len() != img_pts.len() || plane_pts.len() < 4 {
        return None;
    }

    let (r, tr) = normalize_points(plane_pts);
    let (i, ti) = normalize_points(img_pts);

    // A is (2N x 9); padded with zero rows so the thin SVD always yields all 9
    // right singular vectors.
    let n = plane_pts.len();
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);

    for k in 0..n {
        let (x, y) = (r[k].x, r[k].y);
        let (u, v) = (i[k].x, i[k].y);

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Solve Ah = 0: h is the right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let vt = svd.v_t?;
    let smallest = svd.singular_values.argmin().0;
    let h = vt.row(smallest);

    let hn = Matrix3::<f64>::from_row_slice(&[
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8],
    ]);

    // Denormalize: H = Ti^{-1} * Hn * Tr
    let h_den = ti.try_inverse()? * hn * tr;
    let s = h_den[(2, 2)];
    if s.abs() < 1e-12 || !s.is_finite() {
        return None;
    }

    Some(Homography::new(h_den / s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn dlt_recovers_overdetermined_homography() {
        let ground_truth = Homography::new(Matrix3::new(
            1.0, 0.2, 12.0, //
            -0.1, 0.9, 6.0, //
            0.0006, 0.0004, 1.0,
        ));

        let plane: Vec<Point2<f64>> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Point2::new(x as f64 * 40.0, y as f64 * 50.0)))
            .collect();
        let img: Vec<Point2<f64>> = plane.iter().map(|&p| ground_truth.apply(p)).collect();

        let estimated = estimate_homography(&plane, &img).expect("estimate");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(80.0, 100.0),
        ] {
            assert_close(estimated.apply(p), ground_truth.apply(p), 1e-6);
        }
    }

    #[test]
    fn four_points_are_enough() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));
        let plane = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let img: Vec<_> = plane.iter().map(|&p| ground_truth.apply(p)).collect();

        let recovered = estimate_homography(&plane, &img).expect("recoverable");
        assert_close(
            recovered.apply(Point2::new(60.0, 40.0)),
            ground_truth.apply(Point2::new(60.0, 40.0)),
            1e-6,
        );
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let plane = [Point2::new(0.0, 0.0); 4];
        let img = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&plane, &img).is_none());
    }
}
