use crate::lm::{LeastSquaresProblem, LevenbergMarquardt, SolverReport};
use crate::planar_pose::pose_from_homography;
use crate::zhang::zhang_intrinsics;
use crate::CalibrationError;
use calib_measure_core::{
    estimate_homography, CorrespondenceSet, DistortionCoefficients, ExtrinsicPose, IntrinsicMatrix,
    PinholeCamera,
};
use log::{debug, info};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Intrinsic parameters in the solver vector: `fx, fy, cx, cy, k1, k2, p1, p2, k3`.
const INTRINSIC_DIM: usize = 9;
/// Per-view pose parameters: axis-angle rotation then translation.
const POSE_DIM: usize = 6;

const K3_INDEX: usize = 8;
const P1_INDEX: usize = 6;
const P2_INDEX: usize = 7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Minimal number of views with a complete detection.
    pub min_views: usize,
    pub max_iterations: usize,
    /// Stop when `|δ| < step_tolerance * |x|`.
    pub step_tolerance: f64,
    /// Stop when the relative cost decrease falls below this value.
    pub cost_tolerance: f64,
    /// Hold `k3` at zero.
    pub fix_k3: bool,
    /// Hold `p1`, `p2` at zero.
    pub fix_tangential: bool,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            min_views: 10,
            max_iterations: 100,
            step_tolerance: 1e-10,
            cost_tolerance: 1e-12,
            fix_k3: false,
            fix_tangential: false,
        }
    }
}

/// Output of [`IntrinsicCalibrator::calibrate`].
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationResult {
    pub camera: PinholeCamera,
    /// Board-to-camera pose of every view, in input order.
    pub poses: Vec<ExtrinsicPose>,
    /// RMS reprojection error over all points, pixels.
    pub rms_error: f64,
    /// RMS reprojection error of each view, pixels.
    pub per_view_rms: Vec<f64>,
    pub image_size: (u32, u32),
    pub report: SolverReport,
}

/// Planar intrinsic calibration: Zhang initialisation + LM refinement.
#[derive(Clone, Debug, Default)]
pub struct IntrinsicCalibrator {
    pub options: CalibrationOptions,
}

impl IntrinsicCalibrator {
    pub fn new(options: CalibrationOptions) -> Self {
        Self { options }
    }

    /// Solve intrinsics, distortion and poses from `views` taken with an
    /// image of `image_size` pixels.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, views), fields(num_views = views.len()))
    )]
    pub fn calibrate(
        &self,
        views: Vec<CorrespondenceSet>,
        image_size: (u32, u32),
    ) -> Result<CalibrationResult, CalibrationError> {
        let required = self.options.min_views.max(2);
        if views.len() < required {
            return Err(CalibrationError::InsufficientCalibrationData {
                found: views.len(),
                required,
            });
        }

        let mut homographies = Vec::with_capacity(views.len());
        for (idx, view) in views.iter().enumerate() {
            let h = estimate_homography(&view.planar_points(), view.image_points()).ok_or_else(
                || CalibrationError::DegenerateGeometry(format!("no homography for view {idx}")),
            )?;
            homographies.push(h);
        }

        let k0 = zhang_intrinsics(&homographies, image_size)?;
        debug!(
            "zhang init: fx={:.3} fy={:.3} cx={:.3} cy={:.3}",
            k0.fx, k0.fy, k0.cx, k0.cy
        );

        let mut poses0 = Vec::with_capacity(views.len());
        for (idx, h) in homographies.iter().enumerate() {
            let pose = pose_from_homography(&k0, h).ok_or_else(|| {
                CalibrationError::DegenerateGeometry(format!("no initial pose for view {idx}"))
            })?;
            poses0.push(pose);
        }

        let problem = ReprojectionProblem {
            views: &views,
            fixed: self.fixed_mask(),
        };
        let x0 = pack_params(&k0, &DistortionCoefficients::zero(), &poses0);
        let lm = LevenbergMarquardt {
            max_iterations: self.options.max_iterations,
            step_tolerance: self.options.step_tolerance,
            cost_tolerance: self.options.cost_tolerance,
            ..LevenbergMarquardt::default()
        };
        let (x, report) = lm
            .minimize(&problem, x0)
            .map_err(|e| CalibrationError::DegenerateGeometry(e.to_string()))?;

        let (camera, poses) = unpack_params(&x);
        let k = camera.intrinsics;
        if !(k.fx.is_finite() && k.fy.is_finite() && k.fx > 0.0 && k.fy > 0.0) {
            return Err(CalibrationError::DegenerateGeometry(format!(
                "refined focal length is invalid (fx={}, fy={})",
                k.fx, k.fy
            )));
        }

        let mut total_sq = 0.0;
        let mut total_points = 0usize;
        let mut per_view_rms = Vec::with_capacity(views.len());
        for (view, pose) in views.iter().zip(&poses) {
            let r = view_residuals(&camera, pose, view).ok_or_else(|| {
                CalibrationError::DegenerateGeometry("board behind the camera".into())
            })?;
            let sq = r.iter().map(|v| v * v).sum::<f64>();
            total_sq += sq;
            total_points += view.len();
            per_view_rms.push((sq / view.len().max(1) as f64).sqrt());
        }
        let rms_error = (total_sq / total_points.max(1) as f64).sqrt();

        info!(
            "calibrated {} views: fx={:.3} fy={:.3} cx={:.3} cy={:.3}, rms {:.4} px ({:?} after {} iterations)",
            views.len(),
            k.fx,
            k.fy,
            k.cx,
            k.cy,
            rms_error,
            report.termination,
            report.iterations
        );

        Ok(CalibrationResult {
            camera,
            poses,
            rms_error,
            per_view_rms,
            image_size,
            report,
        })
    }

    fn fixed_mask(&self) -> [bool; INTRINSIC_DIM] {
        let mut fixed = [false; INTRINSIC_DIM];
        fixed[K3_INDEX] = self.options.fix_k3;
        fixed[P1_INDEX] = self.options.fix_tangential;
        fixed[P2_INDEX] = self.options.fix_tangential;
        fixed
    }
}

fn pack_params(
    k: &IntrinsicMatrix,
    dist: &DistortionCoefficients,
    poses: &[ExtrinsicPose],
) -> DVector<f64> {
    let mut x = DVector::zeros(INTRINSIC_DIM + POSE_DIM * poses.len());
    x[0] = k.fx;
    x[1] = k.fy;
    x[2] = k.cx;
    x[3] = k.cy;
    for (i, c) in dist.to_array().into_iter().enumerate() {
        x[4 + i] = c;
    }
    for (v, pose) in poses.iter().enumerate() {
        let r = pose.rotation.scaled_axis();
        let t = pose.translation.vector;
        let base = INTRINSIC_DIM + POSE_DIM * v;
        x.rows_mut(base, POSE_DIM)
            .copy_from_slice(&[r.x, r.y, r.z, t.x, t.y, t.z]);
    }
    x
}

fn camera_from(x: &[f64]) -> PinholeCamera {
    PinholeCamera::new(
        IntrinsicMatrix::new(x[0], x[1], x[2], x[3]),
        DistortionCoefficients::from_array([x[4], x[5], x[6], x[7], x[8]]),
    )
}

fn pose_from(p: &[f64]) -> ExtrinsicPose {
    ExtrinsicPose::new(Vector3::new(p[3], p[4], p[5]), Vector3::new(p[0], p[1], p[2]))
}

fn unpack_params(x: &DVector<f64>) -> (PinholeCamera, Vec<ExtrinsicPose>) {
    let s = x.as_slice();
    let camera = camera_from(&s[..INTRINSIC_DIM]);
    let poses = s[INTRINSIC_DIM..]
        .chunks_exact(POSE_DIM)
        .map(pose_from)
        .collect();
    (camera, poses)
}

/// `projected - observed`, interleaved `(du, dv)` per point.
fn view_residuals(
    camera: &PinholeCamera,
    pose: &ExtrinsicPose,
    view: &CorrespondenceSet,
) -> Option<Vec<f64>> {
    let mut out = Vec::with_capacity(2 * view.len());
    for (pw, observed) in view.iter() {
        let p = camera.project(pose, pw)?;
        out.push(p.x - observed.x);
        out.push(p.y - observed.y);
    }
    Some(out)
}

/// Joint reprojection error of all views.
struct ReprojectionProblem<'a> {
    views: &'a [CorrespondenceSet],
    fixed: [bool; INTRINSIC_DIM],
}

impl ReprojectionProblem<'_> {
    fn view_residuals_at(&self, params: &[f64], v: usize) -> Option<Vec<f64>> {
        let base = INTRINSIC_DIM + POSE_DIM * v;
        view_residuals(
            &camera_from(&params[..INTRINSIC_DIM]),
            &pose_from(&params[base..base + POSE_DIM]),
            &self.views[v],
        )
    }
}

impl LeastSquaresProblem for ReprojectionProblem<'_> {
    fn residuals(&self, params: &DVector<f64>) -> Option<DVector<f64>> {
        let mut out = Vec::new();
        for v in 0..self.views.len() {
            out.extend(self.view_residuals_at(params.as_slice(), v)?);
        }
        Some(DVector::from_vec(out))
    }

    /// Central differences, evaluated view by view: the residuals of view `v`
    /// depend only on the intrinsics and the pose of `v`.
    fn jacobian(&self, params: &DVector<f64>) -> Option<DMatrix<f64>> {
        let rows: usize = self.views.iter().map(|v| 2 * v.len()).sum();
        let mut jac = DMatrix::zeros(rows, params.len());
        let mut work = params.as_slice().to_vec();

        let mut row0 = 0;
        for v in 0..self.views.len() {
            let n = 2 * self.views[v].len();
            let base = INTRINSIC_DIM + POSE_DIM * v;
            let columns = (0..INTRINSIC_DIM)
                .filter(|&c| !self.fixed[c])
                .chain(base..base + POSE_DIM);
            for col in columns {
                let x = work[col];
                let h = 1e-6 * x.abs().max(1.0);
                work[col] = x + h;
                let plus = self.view_residuals_at(&work, v);
                work[col] = x - h;
                let minus = self.view_residuals_at(&work, v);
                work[col] = x;
                let (plus, minus) = (plus?, minus?);
                for r in 0..n {
                    jac[(row0 + r, col)] = (plus[r] - minus[r]) / (2.0 * h);
                }
            }
            row0 += n;
        }
        Some(jac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn params_round_trip() {
        let k = IntrinsicMatrix::new(900.0, 880.0, 640.0, 360.0);
        let dist = DistortionCoefficients::from_array([-0.1, 0.02, 0.001, -0.002, 0.003]);
        let pose = ExtrinsicPose::from_parts(
            Translation3::new(-80.0, -60.0, 600.0),
            UnitQuaternion::from_euler_angles(0.2, -0.1, 0.05),
        );
        let x = pack_params(&k, &dist, &[pose]);
        assert_eq!(x.len(), INTRINSIC_DIM + POSE_DIM);

        let (camera, poses) = unpack_params(&x);
        assert_eq!(camera.intrinsics, k);
        assert_eq!(camera.distortion, dist);
        assert!((poses[0].translation.vector - pose.translation.vector).norm() < 1e-12);
        assert!(poses[0].rotation.angle_to(&pose.rotation) < 1e-12);
    }

    #[test]
    fn fixed_mask_follows_options() {
        let calibrator = IntrinsicCalibrator::new(CalibrationOptions {
            fix_k3: true,
            fix_tangential: true,
            ..CalibrationOptions::default()
        });
        let mask = calibrator.fixed_mask();
        assert!(mask[K3_INDEX] && mask[P1_INDEX] && mask[P2_INDEX]);
        assert!(!mask[..P1_INDEX].iter().any(|&f| f));
    }

    #[test]
    fn too_few_views_fail_before_solving() {
        let calibrator = IntrinsicCalibrator::default();
        let err = calibrator
            .calibrate(Vec::new(), (640, 480))
            .expect_err("no views");
        assert_eq!(
            err,
            CalibrationError::InsufficientCalibrationData {
                found: 0,
                required: 10
            }
        );
    }
}
