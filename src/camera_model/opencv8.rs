use nalgebra as na;

use crate::types::{CameraIntrinsics, DISTORTION_LEN, RvecTvec};

/// Pinhole camera with the OpenCV rational + tangential distortion model.
///
/// Distortion order is `[k1, k2, p1, p2, k3, k4, k5, k6]`. Generic over the
/// scalar so the same projection drives both scoring (`f64`) and the
/// autodiff residuals of the solver.
#[derive(Debug, Clone)]
pub struct OpenCVModel8<T: na::RealField + Clone> {
    pub fx: T,
    pub fy: T,
    pub cx: T,
    pub cy: T,
    pub distortion: [T; DISTORTION_LEN],
}

impl<T: na::RealField + Clone> OpenCVModel8<T> {
    /// `camera_params` is `[fx, fy, cx, cy]`. A shorter `distortion` vector is
    /// padded with zeros, so `[k1, k2, p1, p2, k3]` is accepted as well.
    pub fn new(camera_params: &na::DVector<T>, distortion: &na::DVector<T>) -> OpenCVModel8<T> {
        let dist: [T; DISTORTION_LEN] = std::array::from_fn(|i| {
            if i < distortion.len() {
                distortion[i].clone()
            } else {
                T::zero()
            }
        });
        OpenCVModel8 {
            fx: camera_params[0].clone(),
            fy: camera_params[1].clone(),
            cx: camera_params[2].clone(),
            cy: camera_params[3].clone(),
            distortion: dist,
        }
    }

    /// Projects a point given in the camera frame.
    pub fn project_one(&self, pt: &na::Vector3<T>) -> na::Vector2<T> {
        let one = T::one();
        let two = T::from_f64(2.0).unwrap();
        let [k1, k2, p1, p2, k3, k4, k5, k6] = self.distortion.clone();

        let xn = pt[0].clone() / pt[2].clone();
        let yn = pt[1].clone() / pt[2].clone();
        let r2 = xn.clone() * xn.clone() + yn.clone() * yn.clone();
        let r4 = r2.clone() * r2.clone();
        let r6 = r4.clone() * r2.clone();

        let num = one.clone() + k1 * r2.clone() + k2 * r4.clone() + k3 * r6.clone();
        let den = one + k4 * r2.clone() + k5 * r4 + k6 * r6;
        let radial = num / den;

        let xy = xn.clone() * yn.clone();
        let xd = xn.clone() * radial.clone()
            + two.clone() * p1.clone() * xy.clone()
            + p2.clone() * (r2.clone() + two.clone() * xn.clone() * xn);
        let yd = yn.clone() * radial
            + p1 * (r2 + two.clone() * yn.clone() * yn)
            + two * p2 * xy;

        na::Vector2::new(
            self.fx.clone() * xd + self.cx.clone(),
            self.fy.clone() * yd + self.cy.clone(),
        )
    }
}

impl OpenCVModel8<f64> {
    pub fn from_intrinsics(intrinsics: &CameraIntrinsics) -> OpenCVModel8<f64> {
        OpenCVModel8 {
            fx: intrinsics.fx,
            fy: intrinsics.fy,
            cx: intrinsics.cx,
            cy: intrinsics.cy,
            distortion: intrinsics.distortion,
        }
    }

    /// Projects board-frame points through `pose`. No visibility culling:
    /// every input point yields an output point.
    pub fn project_with_pose(
        &self,
        p3ds: &[glam::Vec3],
        pose: &RvecTvec,
    ) -> Vec<na::Vector2<f64>> {
        let rvec = pose.na_rvec();
        let tvec = pose.na_tvec();
        p3ds.iter()
            .map(|p| {
                let p = na::Vector3::new(p.x as f64, p.y as f64, p.z as f64);
                self.project_one(&transform_point(&rvec, &tvec, &p))
            })
            .collect()
    }
}

/// Rodrigues rotation of `p` by the axis-angle vector `rvec`.
///
/// Near zero angle the first-order form is used so derivatives stay finite.
pub fn rotate_point<T: na::RealField + Clone>(
    rvec: &na::Vector3<T>,
    p: &na::Vector3<T>,
) -> na::Vector3<T> {
    let theta2 = rvec.norm_squared();
    if theta2 < T::from_f64(1e-14).unwrap() {
        return p + rvec.cross(p);
    }
    let theta = theta2.sqrt();
    let axis = rvec / theta.clone();
    let cos = theta.clone().cos();
    let sin = theta.sin();
    let k_dot_p = axis.dot(p);
    p * cos.clone() + axis.cross(p) * sin + axis * (k_dot_p * (T::one() - cos))
}

pub fn transform_point<T: na::RealField + Clone>(
    rvec: &na::Vector3<T>,
    tvec: &na::Vector3<T>,
    p: &na::Vector3<T>,
) -> na::Vector3<T> {
    rotate_point(rvec, p) + tvec
}
