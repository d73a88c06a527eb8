use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Board pose in the camera frame as an axis-angle rotation and translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvecTvec {
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

pub type PoseEstimate = RvecTvec;

impl RvecTvec {
    pub fn new(rvec: [f64; 3], tvec: [f64; 3]) -> RvecTvec {
        RvecTvec { rvec, tvec }
    }
    pub fn na_rvec(&self) -> na::Vector3<f64> {
        na::Vector3::from(self.rvec)
    }
    pub fn na_tvec(&self) -> na::Vector3<f64> {
        na::Vector3::from(self.tvec)
    }
    pub fn to_na_isometry3(&self) -> na::Isometry3<f64> {
        na::Isometry3::new(self.na_tvec(), self.na_rvec())
    }
}

pub trait ToRvecTvec {
    fn to_rvec_tvec(&self) -> RvecTvec;
}

impl ToRvecTvec for na::Isometry3<f64> {
    fn to_rvec_tvec(&self) -> RvecTvec {
        let rvec = self.rotation.scaled_axis();
        let tvec = self.translation.vector;
        RvecTvec::new([rvec.x, rvec.y, rvec.z], [tvec.x, tvec.y, tvec.z])
    }
}

pub const DISTORTION_LEN: usize = 8;

/// Pinhole intrinsics with OpenCV-ordered distortion
/// `[k1, k2, p1, p2, k3, k4, k5, k6]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: [f64; DISTORTION_LEN],
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> CameraIntrinsics {
        CameraIntrinsics {
            fx,
            fy,
            cx,
            cy,
            distortion: [0.0; DISTORTION_LEN],
        }
    }

    pub fn with_distortion(mut self, distortion: [f64; DISTORTION_LEN]) -> CameraIntrinsics {
        self.distortion = distortion;
        self
    }

    /// Row-major `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn camera_matrix(&self) -> na::Matrix3<f64> {
        na::Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn from_camera_matrix(
        camera_matrix: &na::Matrix3<f64>,
        distortion: [f64; DISTORTION_LEN],
    ) -> CameraIntrinsics {
        CameraIntrinsics {
            fx: camera_matrix[(0, 0)],
            fy: camera_matrix[(1, 1)],
            cx: camera_matrix[(0, 2)],
            cy: camera_matrix[(1, 2)],
            distortion,
        }
    }

    /// `[fx, fy, cx, cy]`
    pub fn na_camera_params(&self) -> na::DVector<f64> {
        na::dvector![self.fx, self.fy, self.cx, self.cy]
    }

    pub fn na_distortion(&self) -> na::DVector<f64> {
        na::DVector::from_row_slice(&self.distortion)
    }

    pub fn is_finite(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .chain(self.distortion.iter())
            .all(|v| v.is_finite())
    }
}

/// Reprojection quality of one calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub per_view_errors: Vec<f64>,
    pub aggregate_rms: f64,
}
