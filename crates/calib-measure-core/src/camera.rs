use crate::{ImagePoint2D, ObjectPoint3D};
use nalgebra::{Isometry3, Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Rigid transform mapping board coordinates into the camera frame.
pub type ExtrinsicPose = Isometry3<f64>;

/// Zero-skew pinhole intrinsics.
///
/// ```text
///     | fx  0 cx |
/// K = |  0 fy cy |
///     |  0  0  1 |
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl IntrinsicMatrix {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// The 3x3 matrix flattened row-major.
    pub fn to_row_major(&self) -> [f64; 9] {
        [
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        ]
    }

    /// Inverse of [`IntrinsicMatrix::to_row_major`].
    ///
    /// Returns `None` unless the array has zero skew and a `[0, 0, 1]` last row.
    pub fn from_row_major(m: [f64; 9]) -> Option<Self> {
        let structural = [m[1], m[3], m[6], m[7]];
        if structural.iter().any(|v| *v != 0.0) || m[8] != 1.0 {
            return None;
        }
        Some(Self::new(m[0], m[4], m[2], m[5]))
    }

    /// Map a normalized image-plane point to pixels.
    #[inline]
    pub fn to_pixel(&self, n: &Vector2<f64>) -> ImagePoint2D {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    /// Map a pixel to the normalized image plane (ignores distortion).
    #[inline]
    pub fn to_normalized(&self, p: &ImagePoint2D) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

/// Brown–Conrady lens distortion, OpenCV coefficient order `k1, k2, p1, p2, k3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl DistortionCoefficients {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    /// Apply distortion to an undistorted normalized point.
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }
}

/// Intrinsics plus distortion: everything needed to project camera-frame points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinholeCamera {
    pub intrinsics: IntrinsicMatrix,
    pub distortion: DistortionCoefficients,
}

impl PinholeCamera {
    pub fn new(intrinsics: IntrinsicMatrix, distortion: DistortionCoefficients) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Project a board point seen under `pose`. `None` when the point is not in
    /// front of the camera.
    pub fn project(&self, pose: &ExtrinsicPose, pw: &ObjectPoint3D) -> Option<ImagePoint2D> {
        let pc = pose.transform_point(pw);
        if pc.z <= f64::EPSILON {
            return None;
        }
        let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
        let d = self.distortion.distort(&n);
        Some(self.intrinsics.to_pixel(&d))
    }
}
