use calib_measure_core::{ExtrinsicPose, Homography, IntrinsicMatrix};
use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Decompose a plane-induced homography into the board pose `T_C_B`.
///
/// The board lies on `z = 0` in its own frame, so `K^-1 H ~ [r1 r2 t]`. The
/// scale is the mean norm of the first two columns and the rotation is
/// projected onto SO(3) with an SVD. The sign is chosen so the board sits in
/// front of the camera. Returns `None` for a non-finite decomposition.
pub fn pose_from_homography(k: &IntrinsicMatrix, hom: &Homography) -> Option<ExtrinsicPose> {
    let k_inv = k.matrix().try_inverse()?;
    let h = &hom.h;

    let k_inv_h1 = k_inv * h.column(0);
    let k_inv_h2 = k_inv * h.column(1);
    let k_inv_h3 = k_inv * h.column(2);

    let norm = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if !norm.is_finite() || norm <= f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if k_inv_h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * k_inv_h1;
    let r2 = lambda * k_inv_h2;
    let r3 = r1.cross(&r2);

    let mut r_mat = Matrix3::<f64>::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    let svd = r_mat.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t: Vector3<f64> = lambda * k_inv_h3;
    if !t.iter().all(|v| v.is_finite()) {
        return None;
    }
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Some(ExtrinsicPose::from_parts(Translation3::from(t), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn homography_for(k: &IntrinsicMatrix, pose: &ExtrinsicPose) -> Homography {
        let r = pose.rotation.to_rotation_matrix();
        let t = pose.translation.vector;
        let km = k.matrix();
        let mut h = Matrix3::zeros();
        h.set_column(0, &(km * r.matrix().column(0)));
        h.set_column(1, &(km * r.matrix().column(1)));
        h.set_column(2, &(km * t));
        Homography::new(h)
    }

    #[test]
    fn recovers_known_pose() {
        let k = IntrinsicMatrix::new(800.0, 780.0, 640.0, 360.0);
        let pose = ExtrinsicPose::from_parts(
            Translation3::new(0.1, -0.2, 1.5),
            UnitQuaternion::from_euler_angles(0.1, -0.05, 0.2),
        );

        let est = pose_from_homography(&k, &homography_for(&k, &pose)).expect("pose");
        let dt = (est.translation.vector - pose.translation.vector).norm();
        assert!(dt < 1e-9, "translation error {dt}");
        assert_relative_eq!(est.rotation.angle_to(&pose.rotation), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn sign_of_homography_does_not_matter() {
        let k = IntrinsicMatrix::new(800.0, 800.0, 320.0, 240.0);
        let pose = ExtrinsicPose::from_parts(
            Translation3::new(-0.3, 0.1, 2.0),
            UnitQuaternion::from_euler_angles(-0.2, 0.1, 0.0),
        );
        let mut h = homography_for(&k, &pose);
        h.h = -h.h;

        let est = pose_from_homography(&k, &h).expect("pose");
        assert!(est.translation.vector.z > 0.0);
        assert!((est.translation.vector - pose.translation.vector).norm() < 1e-9);
    }
}
