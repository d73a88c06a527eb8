//! Reprojection error of a calibration.
//!
//! For each view the board corners are projected through the view pose and
//! the intrinsics, and `err` is the L2 norm of the flattened difference to the
//! detected corners. The per-view figure is `sqrt(err² / n)` and the aggregate
//! is `sqrt(Σ err² / Σ n)`, with `n` the number of corners of the view.

use log::debug;

use crate::camera_model::OpenCVModel8;
use crate::detected_points::CorrespondenceSet;
use crate::error::{CalibError, Result};
use crate::types::{CameraIntrinsics, ErrorReport, RvecTvec};

/// Per-view error from the view's L2 norm `err` over `n` points.
pub fn view_error(err: f64, n: usize) -> f64 {
    (err * err / n as f64).sqrt()
}

/// Aggregate RMS from summed squared norms and summed point counts.
pub fn aggregate_rms(total_err_sq: f64, total_points: usize) -> f64 {
    (total_err_sq / total_points as f64).sqrt()
}

/// L2 norm between two equally long point sequences, flattened to `[x0, y0, x1, ...]`.
pub fn l2_norm(observed: &[glam::Vec2], projected: &[nalgebra::Vector2<f64>]) -> f64 {
    observed
        .iter()
        .zip(projected)
        .map(|(o, p)| {
            let dx = o.x as f64 - p.x;
            let dy = o.y as f64 - p.y;
            dx * dx + dy * dy
        })
        .sum::<f64>()
        .sqrt()
}

pub fn score(
    correspondences: &CorrespondenceSet,
    poses: &[RvecTvec],
    intrinsics: &CameraIntrinsics,
) -> Result<ErrorReport> {
    if correspondences.is_empty() {
        return Err(CalibError::InsufficientData);
    }
    if correspondences.len() != poses.len() {
        return Err(CalibError::ShapeMismatch(format!(
            "{} views but {} poses",
            correspondences.len(),
            poses.len()
        )));
    }

    let model = OpenCVModel8::from_intrinsics(intrinsics);
    let mut per_view_errors = Vec::with_capacity(correspondences.len());
    let mut total_err_sq = 0.0;
    let mut total_points = 0usize;

    for (frame, pose) in correspondences.iter().zip(poses) {
        if frame.world_points.len() != frame.image_points.len() || frame.is_empty() {
            return Err(CalibError::ShapeMismatch(format!(
                "image {} has {} world points and {} image points",
                frame.image_index,
                frame.world_points.len(),
                frame.image_points.len()
            )));
        }
        let projected = model.project_with_pose(&frame.world_points, pose);
        let err = l2_norm(&frame.image_points, &projected);
        let n = frame.len();
        let e = view_error(err, n);
        debug!("image {}: reprojection error {:.5}", frame.image_index, e);
        per_view_errors.push(e);
        total_err_sq += err * err;
        total_points += n;
    }

    Ok(ErrorReport {
        per_view_errors,
        aggregate_rms: aggregate_rms(total_err_sq, total_points),
    })
}
