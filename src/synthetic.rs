//! Synthetic checkerboard views with known ground truth.

use glam::Vec2;
use image::{DynamicImage, GrayImage, Luma};
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::board::{PatternSpec, generate_reference_corners};
use crate::camera_model::OpenCVModel8;
use crate::detected_points::{CorrespondenceSet, FrameFeature};
use crate::types::{CameraIntrinsics, RvecTvec};

const DARK: f64 = 20.0;
const LIGHT: f64 = 235.0;
const MAX_POSE_TRIES: usize = 200;

/// Inverts the distortion of a normalized image point by fixed-point iteration.
pub fn undistort_normalized(xd: f64, yd: f64, distortion: &[f64; 8]) -> (f64, f64) {
    let [k1, k2, p1, p2, k3, k4, k5, k6] = *distortion;
    let (mut x, mut y) = (xd, yd);
    for _ in 0..20 {
        let r2 = x * x + y * y;
        let icdist = (1.0 + ((k6 * r2 + k5) * r2 + k4) * r2) / (1.0 + ((k3 * r2 + k2) * r2 + k1) * r2);
        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        x = (xd - dx) * icdist;
        y = (yd - dy) * icdist;
    }
    (x, y)
}

fn board_intensity(pattern: &PatternSpec, bx: f64, by: f64) -> f64 {
    let s = pattern.square_size();
    let qx = (bx / s).floor() as i64 + 1;
    let qy = (by / s).floor() as i64 + 1;
    let inside = (0..=pattern.width() as i64).contains(&qx)
        && (0..=pattern.height() as i64).contains(&qy);
    if inside && (qx + qy) % 2 == 0 { DARK } else { LIGHT }
}

/// Renders the board seen from `pose`, with a light margin around the squares.
///
/// Each pixel averages 2×2 samples. Pixel centres are on integer coordinates.
pub fn render_chessboard(
    pattern: &PatternSpec,
    intrinsics: &CameraIntrinsics,
    pose: &RvecTvec,
    image_size: (u32, u32),
) -> DynamicImage {
    let iso = pose.to_na_isometry3();
    let rot = iso.rotation.to_rotation_matrix();
    let t = iso.translation.vector;
    let normal = rot * na::Vector3::z();
    let n_dot_t = normal.dot(&t);
    let offsets = [-0.25, 0.25];

    let img = GrayImage::from_fn(image_size.0, image_size.1, |u, v| {
        let mut acc = 0.0;
        for oy in offsets {
            for ox in offsets {
                let xd = (u as f64 + ox - intrinsics.cx) / intrinsics.fx;
                let yd = (v as f64 + oy - intrinsics.cy) / intrinsics.fy;
                let (x, y) = undistort_normalized(xd, yd, &intrinsics.distortion);
                let ray = na::Vector3::new(x, y, 1.0);
                let denom = normal.dot(&ray);
                let s = if denom.abs() > 1e-12 { n_dot_t / denom } else { -1.0 };
                acc += if s > 0.0 {
                    let pb = rot.transpose() * (ray * s - t);
                    board_intensity(pattern, pb.x, pb.y)
                } else {
                    LIGHT
                };
            }
        }
        Luma([(acc / 4.0).round() as u8])
    });
    DynamicImage::ImageLuma8(img)
}

/// Random board poses that keep every corner inside the image with a margin
/// of one square.
pub fn random_views(
    pattern: &PatternSpec,
    intrinsics: &CameraIntrinsics,
    image_size: (u32, u32),
    count: usize,
    seed: u64,
) -> Vec<RvecTvec> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let s = pattern.square_size();
    let extent = s * (pattern.width().max(pattern.height()) + 1) as f64;
    let center = na::Vector3::new(
        (pattern.width() - 1) as f64 * s * 0.5,
        (pattern.height() - 1) as f64 * s * 0.5,
        0.0,
    );
    let base_z = intrinsics.fx * extent / (0.6 * image_size.0 as f64);
    let model = OpenCVModel8::from_intrinsics(intrinsics);
    let corners = generate_reference_corners(pattern);
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);

    let mut poses = Vec::with_capacity(count);
    for _ in 0..count {
        for _ in 0..MAX_POSE_TRIES {
            let rvec = na::Vector3::new(
                rng.random_range(-0.35..0.35),
                rng.random_range(-0.35..0.35),
                rng.random_range(-0.2..0.2),
            );
            let z = base_z * rng.random_range(0.9..1.3);
            let target = na::Vector3::new(
                rng.random_range(-0.1..0.1) * z,
                rng.random_range(-0.1..0.1) * z,
                z,
            );
            let rot = na::Rotation3::from_scaled_axis(rvec);
            let t = target - rot * center;
            let pose = RvecTvec::new([rvec.x, rvec.y, rvec.z], [t.x, t.y, t.z]);

            let margin = intrinsics.fx * s / z;
            let fits = model.project_with_pose(&corners, &pose).iter().all(|p| {
                p.x > margin && p.y > margin && p.x < w - margin && p.y < h - margin
            });
            if fits {
                poses.push(pose);
                break;
            }
        }
    }
    poses
}

fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Projected reference corners for each pose, with optional pixel noise.
pub fn synthetic_correspondences(
    pattern: &PatternSpec,
    intrinsics: &CameraIntrinsics,
    poses: &[RvecTvec],
    noise_std: f64,
    seed: u64,
) -> CorrespondenceSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let world_points = generate_reference_corners(pattern);
    let model = OpenCVModel8::from_intrinsics(intrinsics);
    poses
        .iter()
        .enumerate()
        .map(|(image_index, pose)| {
            let image_points = model
                .project_with_pose(&world_points, pose)
                .iter()
                .map(|p| {
                    let (nx, ny) = if noise_std > 0.0 {
                        (gaussian(&mut rng) * noise_std, gaussian(&mut rng) * noise_std)
                    } else {
                        (0.0, 0.0)
                    };
                    Vec2::new((p.x + nx) as f32, (p.y + ny) as f32)
                })
                .collect();
            FrameFeature {
                image_index,
                image_points,
                world_points: world_points.clone(),
            }
        })
        .collect()
}
