use image::DynamicImage;
use indicatif::ProgressIterator;
use log::{debug, info, warn};

use crate::board::generate_reference_corners;
use crate::config::CalibrationContext;
use crate::detected_points::{CorrespondenceSet, FrameFeature};
use crate::detector::{CornerSearch, CornerViewer, detect_corners};
use crate::error::{CalibError, Result};
use crate::optimization::{CalibrationSolver, SolverInput};
use crate::reprojection;
use crate::sensor;
use crate::types::{CameraIntrinsics, DISTORTION_LEN, ErrorReport, RvecTvec};

/// Result of one calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutput {
    pub intrinsics: CameraIntrinsics,
    /// One pose per entry of `correspondences`.
    pub poses: Vec<RvecTvec>,
    pub correspondences: CorrespondenceSet,
    pub error_report: ErrorReport,
    pub image_size: (u32, u32),
    /// Input indices of the images that did not contribute a view.
    pub rejected_images: Vec<usize>,
}

/// Corner correspondences of every usable image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSummary {
    pub correspondences: CorrespondenceSet,
    pub image_size: Option<(u32, u32)>,
    pub rejected_images: Vec<usize>,
}

/// Detects the board in every image and pairs each hit with the reference
/// corners. Images whose size differs from the first accepted one are rejected.
pub fn collect_correspondences(
    images: &[DynamicImage],
    ctx: &CalibrationContext,
    search: &dyn CornerSearch,
    viewer: Option<&dyn CornerViewer>,
) -> DetectionSummary {
    let world_points = generate_reference_corners(&ctx.pattern);
    let mut summary = DetectionSummary::default();

    for (image_index, image) in images.iter().enumerate().progress_count(images.len() as u64) {
        let size = (image.width(), image.height());
        if let Some(expected) = summary.image_size {
            if expected != size {
                warn!(
                    "image {} is {}x{}, expected {}x{}; skipped",
                    image_index, size.0, size.1, expected.0, expected.1
                );
                summary.rejected_images.push(image_index);
                continue;
            }
        }
        match detect_corners(image, &ctx.pattern, search, ctx.search_flags, viewer) {
            Some(image_points) => {
                summary.image_size.get_or_insert(size);
                summary.correspondences.push(FrameFeature {
                    image_index,
                    image_points,
                    world_points: world_points.clone(),
                });
            }
            None => {
                debug!("image {}: chessboard not found", image_index);
                summary.rejected_images.push(image_index);
            }
        }
    }
    info!(
        "chessboard found in {} of {} images",
        summary.correspondences.len(),
        images.len()
    );
    summary
}

/// Full run: detection, solve and scoring.
pub fn calibrate(
    images: &[DynamicImage],
    ctx: &CalibrationContext,
    search: &dyn CornerSearch,
    solver: &dyn CalibrationSolver,
    viewer: Option<&dyn CornerViewer>,
) -> Result<CalibrationOutput> {
    let summary = collect_correspondences(images, ctx, search, viewer);
    calibrate_detected(summary, ctx, solver)
}

/// Initial intrinsics from the sensor description, when the context asks for it.
pub fn sensor_guess(
    ctx: &CalibrationContext,
    image_size: (u32, u32),
) -> Result<Option<CameraIntrinsics>> {
    if !ctx.use_sensor_guess {
        return Ok(None);
    }
    let Some(spec) = ctx.sensor.as_ref() else {
        warn!("no sensor description, estimating the initial intrinsics");
        return Ok(None);
    };
    if spec.current_resolution != image_size {
        warn!(
            "sensor resolution {:?} differs from image size {:?}",
            spec.current_resolution, image_size
        );
    }
    Ok(Some(sensor::synthesize(spec)?))
}

/// Solve and scoring on the output of [`collect_correspondences`].
pub fn calibrate_detected(
    summary: DetectionSummary,
    ctx: &CalibrationContext,
    solver: &dyn CalibrationSolver,
) -> Result<CalibrationOutput> {
    let Some(image_size) = summary.image_size else {
        return Err(CalibError::InsufficientData);
    };
    if summary.correspondences.len() < ctx.min_images {
        warn!(
            "only {} valid views, at least {} are recommended",
            summary.correspondences.len(),
            ctx.min_images
        );
    }
    let guess = sensor_guess(ctx, image_size)?;
    let mut output = calibrate_correspondences(
        summary.correspondences,
        image_size,
        solver,
        guess.as_ref(),
    )?;
    output.rejected_images = summary.rejected_images;
    Ok(output)
}

/// Solve and scoring on an existing correspondence set.
pub fn calibrate_correspondences(
    correspondences: CorrespondenceSet,
    image_size: (u32, u32),
    solver: &dyn CalibrationSolver,
    guess: Option<&CameraIntrinsics>,
) -> Result<CalibrationOutput> {
    if correspondences.is_empty() {
        return Err(CalibError::InsufficientData);
    }
    for frame in &correspondences {
        if frame.image_points.len() != frame.world_points.len() {
            return Err(CalibError::ShapeMismatch(format!(
                "image {} has {} image points and {} world points",
                frame.image_index,
                frame.image_points.len(),
                frame.world_points.len()
            )));
        }
    }

    let world_points: Vec<_> = correspondences
        .iter()
        .map(|f| f.world_points.clone())
        .collect();
    let image_points: Vec<_> = correspondences
        .iter()
        .map(|f| f.image_points.clone())
        .collect();
    let input = SolverInput {
        world_points: &world_points,
        image_points: &image_points,
        image_size,
        initial_guess: guess,
    };
    let solved = solver.solve(&input)?;

    let views = correspondences.len();
    if solved.rvecs.len() != views || solved.tvecs.len() != views {
        return Err(CalibError::SolverFailure(format!(
            "{} views but {} rotations and {} translations",
            views,
            solved.rvecs.len(),
            solved.tvecs.len()
        )));
    }
    if solved.distortion.len() < 4 || solved.distortion.len() > DISTORTION_LEN {
        return Err(CalibError::SolverFailure(format!(
            "unexpected number of distortion terms {}",
            solved.distortion.len()
        )));
    }
    let intrinsics = solved.intrinsics();
    if !intrinsics.is_finite() {
        return Err(CalibError::SolverFailure(
            "non-finite intrinsics".to_string(),
        ));
    }
    let poses = solved.poses();
    let error_report = reprojection::score(&correspondences, &poses, &intrinsics)?;
    info!(
        "fx {:.3} fy {:.3} cx {:.3} cy {:.3}, rms {:.5} px",
        intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy, error_report.aggregate_rms
    );

    Ok(CalibrationOutput {
        intrinsics,
        poses,
        correspondences,
        error_report,
        image_size,
        rejected_images: Vec::new(),
    })
}
