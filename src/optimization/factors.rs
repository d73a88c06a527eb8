use nalgebra as na;
use tiny_solver::factors::Factor;

use crate::camera_model::{OpenCVModel8, transform_point};

/// Pixel residual of one board corner.
///
/// Parameter blocks: `[camera (fx, fy, cx, cy), distortion, rvec, tvec]`.
/// The distortion block holds either `[k1, k2, p1, p2, k3]` or all eight
/// rational-model terms.
#[derive(Debug, Clone)]
pub struct ReprojectionFactor {
    pub p3d: na::Vector3<f64>,
    pub p2d: na::Vector2<f64>,
}

impl ReprojectionFactor {
    pub fn new(p3d: &glam::Vec3, p2d: &glam::Vec2) -> ReprojectionFactor {
        let p3d = na::Vector3::new(p3d.x as f64, p3d.y as f64, p3d.z as f64);
        let p2d = na::Vector2::new(p2d.x as f64, p2d.y as f64);
        ReprojectionFactor { p3d, p2d }
    }
}

impl<T: na::RealField> Factor<T> for ReprojectionFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        // params[camera, distortion, rvec, tvec]
        let model = OpenCVModel8::new(&params[0], &params[1]);
        let rvec = na::Vector3::new(
            params[2][0].clone(),
            params[2][1].clone(),
            params[2][2].clone(),
        );
        let tvec = na::Vector3::new(
            params[3][0].clone(),
            params[3][1].clone(),
            params[3][2].clone(),
        );
        let p3d: na::Vector3<T> = self.p3d.cast();
        let p3d_t = transform_point(&rvec, &tvec, &p3d);
        let p2d_p = model.project_one(&p3d_t);

        na::dvector![
            p2d_p[0].clone() - T::from_f64(self.p2d[0]).unwrap(),
            p2d_p[1].clone() - T::from_f64(self.p2d[1]).unwrap()
        ]
    }
}
