use calib_measure_core::{
    BoardSpec, CorrespondenceSet, DistortionCoefficients, ExtrinsicPose, IntrinsicMatrix,
    PinholeCamera,
};
use calib_measure_intrinsics::{CalibrationError, CalibrationOptions, IntrinsicCalibrator};
use nalgebra::{Point3, Translation3, UnitQuaternion, Vector3};

const IMAGE_SIZE: (u32, u32) = (1280, 720);

fn ground_truth_intrinsics() -> IntrinsicMatrix {
    IntrinsicMatrix::new(900.0, 880.0, 640.0, 360.0)
}

fn board() -> BoardSpec {
    BoardSpec::new(9, 7, 20.0).expect("valid board")
}

/// Board poses looking at the board center from ~600 mm, with varied tilt.
fn poses() -> Vec<ExtrinsicPose> {
    let tilts = [
        (0.30, 0.00, 0.00, 0.0, 0.0),
        (-0.30, 0.05, 0.10, 40.0, -20.0),
        (0.00, 0.30, -0.05, -60.0, 10.0),
        (0.05, -0.30, 0.20, 60.0, 30.0),
        (0.25, 0.25, 0.00, -30.0, -40.0),
        (-0.25, 0.20, -0.30, 20.0, 40.0),
        (0.20, -0.25, 0.40, -80.0, -10.0),
        (-0.20, -0.20, -0.20, 80.0, 0.0),
        (0.35, 0.10, 1.20, 0.0, 50.0),
        (-0.10, 0.35, -1.00, -50.0, -50.0),
        (0.15, -0.35, 2.50, 30.0, 20.0),
        (-0.35, -0.10, 0.70, -20.0, 30.0),
    ];
    let center = Vector3::new(80.0, 60.0, 0.0);
    tilts
        .iter()
        .enumerate()
        .map(|(k, &(rx, ry, rz, dx, dy))| {
            let rot = UnitQuaternion::from_euler_angles(rx, ry, rz);
            let z = 550.0 + 15.0 * k as f64;
            let t = Vector3::new(dx, dy, z) - rot * center;
            ExtrinsicPose::from_parts(Translation3::from(t), rot)
        })
        .collect()
}

fn synthetic_views(camera: &PinholeCamera, poses: &[ExtrinsicPose]) -> Vec<CorrespondenceSet> {
    let object: Vec<Point3<f64>> = board().object_points();
    poses
        .iter()
        .map(|pose| {
            let image = object
                .iter()
                .map(|pw| camera.project(pose, pw).expect("board in front of camera"))
                .collect();
            CorrespondenceSet::new(object.clone(), image).expect("matched lengths")
        })
        .collect()
}

#[test]
fn recovers_intrinsics_without_distortion() {
    let camera = PinholeCamera::new(ground_truth_intrinsics(), DistortionCoefficients::zero());
    let views = synthetic_views(&camera, &poses());

    let result = IntrinsicCalibrator::new(CalibrationOptions::default())
        .calibrate(views, IMAGE_SIZE)
        .expect("calibration succeeds");

    let k = result.camera.intrinsics;
    assert!((k.fx - 900.0).abs() < 1e-3, "fx = {}", k.fx);
    assert!((k.fy - 880.0).abs() < 1e-3, "fy = {}", k.fy);
    assert!((k.cx - 640.0).abs() < 1e-3, "cx = {}", k.cx);
    assert!((k.cy - 360.0).abs() < 1e-3, "cy = {}", k.cy);
    assert!(result.rms_error < 1e-6, "rms = {}", result.rms_error);
    assert_eq!(result.poses.len(), 12);
    assert_eq!(result.per_view_rms.len(), 12);
    assert_eq!(result.image_size, IMAGE_SIZE);
}

#[test]
fn refines_distortion_and_poses() {
    let truth = DistortionCoefficients::from_array([-0.08, 0.02, 5e-4, -4e-4, 0.0]);
    let camera = PinholeCamera::new(ground_truth_intrinsics(), truth);
    let poses = poses();
    let views = synthetic_views(&camera, &poses);

    let options = CalibrationOptions {
        fix_k3: true,
        ..CalibrationOptions::default()
    };
    let result = IntrinsicCalibrator::new(options)
        .calibrate(views, IMAGE_SIZE)
        .expect("calibration succeeds");

    let k = result.camera.intrinsics;
    let d = result.camera.distortion;
    assert!((k.fx - 900.0).abs() < 0.5, "fx = {}", k.fx);
    assert!((k.fy - 880.0).abs() < 0.5, "fy = {}", k.fy);
    assert!((k.cx - 640.0).abs() < 1.0, "cx = {}", k.cx);
    assert!((k.cy - 360.0).abs() < 1.0, "cy = {}", k.cy);
    assert!((d.k1 - truth.k1).abs() < 5e-3, "k1 = {}", d.k1);
    assert!((d.p1 - truth.p1).abs() < 5e-4, "p1 = {}", d.p1);
    assert_eq!(d.k3, 0.0);
    assert!(result.rms_error < 1e-3, "rms = {}", result.rms_error);
    assert!(result.report.final_cost <= result.report.initial_cost);

    let dt = (result.poses[3].translation.vector - poses[3].translation.vector).norm();
    assert!(dt < 1.0, "translation error {dt} mm");
}

#[test]
fn identical_views_are_degenerate() {
    let camera = PinholeCamera::new(ground_truth_intrinsics(), DistortionCoefficients::zero());
    let pose = poses()[1];
    let views = synthetic_views(&camera, &[pose; 10]);

    let err = IntrinsicCalibrator::default()
        .calibrate(views, IMAGE_SIZE)
        .expect_err("identical views");
    assert!(matches!(err, CalibrationError::DegenerateGeometry(_)), "{err:?}");
}

#[test]
fn too_few_views_are_rejected() {
    let camera = PinholeCamera::new(ground_truth_intrinsics(), DistortionCoefficients::zero());
    let views = synthetic_views(&camera, &poses()[..3]);

    let err = IntrinsicCalibrator::default()
        .calibrate(views, IMAGE_SIZE)
        .expect_err("three views");
    assert_eq!(
        err,
        CalibrationError::InsufficientCalibrationData {
            found: 3,
            required: 10
        }
    );
}

#[test]
fn min_views_is_configurable() {
    let camera = PinholeCamera::new(ground_truth_intrinsics(), DistortionCoefficients::zero());
    let views = synthetic_views(&camera, &poses()[..4]);

    let options = CalibrationOptions {
        min_views: 4,
        fix_k3: true,
        fix_tangential: true,
        ..CalibrationOptions::default()
    };
    let result = IntrinsicCalibrator::new(options)
        .calibrate(views, IMAGE_SIZE)
        .expect("four views suffice when allowed");
    assert!((result.camera.intrinsics.fx - 900.0).abs() < 1e-2);
    assert_eq!(result.camera.distortion.p1, 0.0);
    assert_eq!(result.camera.distortion.p2, 0.0);
}
