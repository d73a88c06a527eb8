use nalgebra as na;

use crate::types::{RvecTvec, ToRvecTvec};

/// Board pose from a board-to-image homography and a camera matrix.
///
/// `H = λ K [r1 r2 t]`. The scale is fixed by `|r1| = 1`, the sign so the
/// board lies in front of the camera, and the rotation is projected back onto
/// SO(3) with an SVD.
pub fn init_pose(homography: &na::Matrix3<f64>, camera_matrix: &na::Matrix3<f64>) -> Option<RvecTvec> {
    let k_inv = camera_matrix.try_inverse()?;
    let m = k_inv * homography;
    let (m1, m2, m3) = (m.column(0), m.column(1), m.column(2));
    let norm = m1.norm();
    if norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if m3[2] * lambda < 0.0 {
        lambda = -lambda;
    }
    let r1 = m1 * lambda;
    let r2 = m2 * lambda;
    let r3 = r1.cross(&r2);
    let t = m3 * lambda;

    let r = na::Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r.svd(true, true);
    let mut rot = svd.u? * svd.v_t?;
    if rot.determinant() < 0.0 {
        rot = -rot;
    }
    let rotation = na::UnitQuaternion::from_matrix(&rot);
    let iso = na::Isometry3::from_parts(na::Translation3::new(t[0], t[1], t[2]), rotation);
    let pose = iso.to_rvec_tvec();
    if pose.rvec.iter().chain(pose.tvec.iter()).all(|v| v.is_finite()) {
        Some(pose)
    } else {
        None
    }
}
