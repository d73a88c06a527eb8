use std::collections::HashMap;

use log::{debug, info};
use nalgebra as na;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};

use super::factors::ReprojectionFactor;
use super::homography::{find_homography, init_camera_matrix};
use super::linear::init_pose;
use crate::error::{CalibError, Result};
use crate::types::{CameraIntrinsics, DISTORTION_LEN, RvecTvec};

/// Per-view correspondences handed to a [`CalibrationSolver`].
#[derive(Debug, Clone, Copy)]
pub struct SolverInput<'a> {
    pub world_points: &'a [Vec<glam::Vec3>],
    pub image_points: &'a [Vec<glam::Vec2>],
    pub image_size: (u32, u32),
    /// Starting intrinsics. When absent they are estimated from homographies.
    pub initial_guess: Option<&'a CameraIntrinsics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub camera_matrix: na::Matrix3<f64>,
    /// `[k1, k2, p1, p2, k3]` or the full rational model, OpenCV order.
    pub distortion: Vec<f64>,
    pub rvecs: Vec<[f64; 3]>,
    pub tvecs: Vec<[f64; 3]>,
}

impl SolverOutput {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        let mut distortion = [0.0; DISTORTION_LEN];
        for (d, v) in distortion.iter_mut().zip(&self.distortion) {
            *d = *v;
        }
        CameraIntrinsics::from_camera_matrix(&self.camera_matrix, distortion)
    }

    pub fn poses(&self) -> Vec<RvecTvec> {
        self.rvecs
            .iter()
            .zip(&self.tvecs)
            .map(|(r, t)| RvecTvec::new(*r, *t))
            .collect()
    }
}

/// Estimates intrinsics, distortion and per-view poses from planar views.
pub trait CalibrationSolver {
    fn solve(&self, input: &SolverInput) -> Result<SolverOutput>;
}

/// Zhang-style initialization refined by a joint Levenberg-Marquardt pass
/// over intrinsics, distortion and every view pose.
#[derive(Debug, Clone, Copy)]
pub struct LmCalibrationSolver {
    pub max_iterations: usize,
    /// Also estimate `k4..k6`. Otherwise they stay at zero.
    pub rational_model: bool,
}

impl Default for LmCalibrationSolver {
    fn default() -> Self {
        LmCalibrationSolver {
            max_iterations: 100,
            rational_model: false,
        }
    }
}

fn to_na_2d(points: &[glam::Vec2]) -> Vec<na::Vector2<f64>> {
    points
        .iter()
        .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
        .collect()
}

fn to_na_plane(points: &[glam::Vec3]) -> Vec<na::Vector2<f64>> {
    points
        .iter()
        .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
        .collect()
}

fn block_to_array(v: &na::DVector<f64>) -> [f64; 3] {
    [v[0], v[1], v[2]]
}

impl LmCalibrationSolver {
    fn distortion_len(&self) -> usize {
        if self.rational_model { DISTORTION_LEN } else { 5 }
    }

    fn initialize(&self, input: &SolverInput) -> Result<(na::Matrix3<f64>, Vec<RvecTvec>)> {
        let homographies = input
            .world_points
            .iter()
            .zip(input.image_points)
            .enumerate()
            .map(|(i, (w, p))| {
                find_homography(&to_na_plane(w), &to_na_2d(p)).ok_or_else(|| {
                    CalibError::SolverFailure(format!("no homography for view {}", i))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let camera_matrix = match input.initial_guess {
            Some(guess) => guess.camera_matrix(),
            None => init_camera_matrix(&homographies, input.image_size),
        };
        debug!("initial camera matrix {}", camera_matrix);

        let poses = homographies
            .iter()
            .enumerate()
            .map(|(i, h)| {
                init_pose(h, &camera_matrix).ok_or_else(|| {
                    CalibError::SolverFailure(format!("no initial pose for view {}", i))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((camera_matrix, poses))
    }
}

impl CalibrationSolver for LmCalibrationSolver {
    fn solve(&self, input: &SolverInput) -> Result<SolverOutput> {
        if input.world_points.is_empty() {
            return Err(CalibError::InsufficientData);
        }
        if input.world_points.len() != input.image_points.len() {
            return Err(CalibError::ShapeMismatch(format!(
                "{} world point sets but {} image point sets",
                input.world_points.len(),
                input.image_points.len()
            )));
        }
        for (i, (w, p)) in input.world_points.iter().zip(input.image_points).enumerate() {
            if w.len() != p.len() || w.len() < 4 {
                return Err(CalibError::ShapeMismatch(format!(
                    "view {} has {} world points and {} image points",
                    i,
                    w.len(),
                    p.len()
                )));
            }
        }

        let (camera_matrix, poses) = self.initialize(input)?;
        let dist_len = self.distortion_len();

        let mut problem = tiny_solver::Problem::new();
        for (i, (w, p)) in input.world_points.iter().zip(input.image_points).enumerate() {
            let rvec_key = format!("rvec{}", i);
            let tvec_key = format!("tvec{}", i);
            for (p3d, p2d) in w.iter().zip(p) {
                let cost = ReprojectionFactor::new(p3d, p2d);
                problem.add_residual_block(
                    2,
                    &["camera", "distortion", rvec_key.as_str(), tvec_key.as_str()],
                    Box::new(cost),
                    None,
                );
            }
        }

        let mut initial_values = HashMap::<String, na::DVector<f64>>::new();
        initial_values.insert(
            "camera".to_string(),
            na::dvector![
                camera_matrix[(0, 0)],
                camera_matrix[(1, 1)],
                camera_matrix[(0, 2)],
                camera_matrix[(1, 2)]
            ],
        );
        let mut dist_init = na::DVector::<f64>::zeros(dist_len);
        if let Some(guess) = input.initial_guess {
            dist_init.copy_from_slice(&guess.distortion[..dist_len]);
        }
        initial_values.insert("distortion".to_string(), dist_init);
        for (i, pose) in poses.iter().enumerate() {
            initial_values.insert(format!("rvec{}", i), na::DVector::from_column_slice(&pose.rvec));
            initial_values.insert(format!("tvec{}", i), na::DVector::from_column_slice(&pose.tvec));
        }

        let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
        let options = OptimizerOptions {
            max_iteration: self.max_iterations,
            verbosity_level: 0,
            ..Default::default()
        };
        info!(
            "optimizing {} views, {} distortion terms",
            input.world_points.len(),
            dist_len
        );
        let result = optimizer
            .optimize(&problem, &initial_values, Some(options))
            .ok_or_else(|| CalibError::SolverFailure("optimizer did not converge".to_string()))?;

        let missing = |key: &str| CalibError::SolverFailure(format!("missing block {}", key));
        let camera = result.get("camera").ok_or_else(|| missing("camera"))?;
        let distortion = result.get("distortion").ok_or_else(|| missing("distortion"))?;
        let (fx, fy, cx, cy) = (camera[0], camera[1], camera[2], camera[3]);
        if !(fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0)
            || !(cx.is_finite() && cy.is_finite())
            || distortion.iter().any(|v| !v.is_finite())
        {
            return Err(CalibError::SolverFailure(format!(
                "degenerate intrinsics fx={} fy={} cx={} cy={}",
                fx, fy, cx, cy
            )));
        }

        let mut rvecs = Vec::with_capacity(poses.len());
        let mut tvecs = Vec::with_capacity(poses.len());
        for i in 0..poses.len() {
            let rk = format!("rvec{}", i);
            let tk = format!("tvec{}", i);
            rvecs.push(block_to_array(result.get(&rk).ok_or_else(|| missing(&rk))?));
            tvecs.push(block_to_array(result.get(&tk).ok_or_else(|| missing(&tk))?));
        }

        Ok(SolverOutput {
            camera_matrix: na::Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            distortion: distortion.iter().copied().collect(),
            rvecs,
            tvecs,
        })
    }
}
