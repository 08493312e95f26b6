use crate::CalibrationError;
use calib_measure_core::{Homography, IntrinsicMatrix};
use nalgebra::{DMatrix, Matrix3, SVector};

/// Relative size of the second-smallest singular value below which the
/// constraint system is treated as having more than one null direction.
const RANK_TOLERANCE: f64 = 1e-9;

/// Build the 6-vector v_ij(H) of Zhang's constraint `v_ij^T b = h_i^T B h_j`.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);

    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Pixel conditioning: maps the image to roughly `[-1, 1]^2`.
fn conditioning(image_size: (u32, u32)) -> (f64, f64, f64) {
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    let s = if w + h > 0.0 { 2.0 / (w + h) } else { 1.0 };
    (s, 0.5 * w, 0.5 * h)
}

/// Closed-form zero-skew intrinsics from plane homographies (Zhang).
///
/// Each homography contributes two rows; one extra row pins `B12 = 0`. The
/// homographies are conditioned with the image size before the SVD and the
/// result is mapped back to pixels.
pub fn zhang_intrinsics(
    homographies: &[Homography],
    image_size: (u32, u32),
) -> Result<IntrinsicMatrix, CalibrationError> {
    if homographies.len() < 2 {
        return Err(CalibrationError::DegenerateGeometry(format!(
            "{} homographies, need at least 2",
            homographies.len()
        )));
    }

    let (s, c0x, c0y) = conditioning(image_size);
    let n = Matrix3::new(s, 0.0, -s * c0x, 0.0, s, -s * c0y, 0.0, 0.0, 1.0);

    let rows = (2 * homographies.len() + 1).max(6);
    let mut vmtx = DMatrix::<f64>::zeros(rows, 6);
    for (k, hom) in homographies.iter().enumerate() {
        let hn = n * hom.h;
        let norm = hn.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(CalibrationError::DegenerateGeometry(format!(
                "homography {k} is not finite"
            )));
        }
        let hn = hn / norm;
        let v11 = v_ij(&hn, 0, 0);
        let v22 = v_ij(&hn, 1, 1);
        let v12 = v_ij(&hn, 0, 1);
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }
    // Zero skew.
    vmtx[(2 * homographies.len(), 1)] = 1.0;

    let svd = vmtx.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        CalibrationError::DegenerateGeometry("SVD of the constraint system failed".into())
    })?;
    let sv = &svd.singular_values;
    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&a, &b| sv[a].total_cmp(&sv[b]));
    let largest = sv[order[order.len() - 1]];
    if largest <= 0.0 || sv[order[1]] / largest < RANK_TOLERANCE {
        return Err(CalibrationError::DegenerateGeometry(
            "views do not constrain the intrinsics (too little pose variation)".into(),
        ));
    }
    let b = v_t.row(order[0]);

    let b11 = b[0];
    let b12 = b[1];
    let b22 = b[2];
    let b13 = b[3];
    let b23 = b[4];
    let b33 = b[5];

    let denom = b11 * b22 - b12 * b12;
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha_sq = lambda / b11;
    let beta_sq = lambda * b11 / denom;
    if !(alpha_sq.is_finite() && beta_sq.is_finite() && alpha_sq > 0.0 && beta_sq > 0.0) {
        return Err(CalibrationError::DegenerateGeometry(
            "closed-form intrinsics are not real".into(),
        ));
    }
    let alpha = alpha_sq.sqrt();
    let beta = beta_sq.sqrt();
    let u0 = -b13 * alpha * alpha / lambda;

    let k = IntrinsicMatrix::new(alpha / s, beta / s, u0 / s + c0x, v0 / s + c0y);
    if !(k.cx.is_finite() && k.cy.is_finite()) {
        return Err(CalibrationError::DegenerateGeometry(
            "principal point is not finite".into(),
        ));
    }
    Ok(k)
}
