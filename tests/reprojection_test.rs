use checkerboard_calibration::CalibError;
use checkerboard_calibration::board::PatternSpec;
use checkerboard_calibration::reprojection::{aggregate_rms, score, view_error};
use checkerboard_calibration::synthetic::synthetic_correspondences;
use checkerboard_calibration::types::{CameraIntrinsics, RvecTvec};
use glam::Vec2;

fn setup() -> (PatternSpec, CameraIntrinsics, Vec<RvecTvec>) {
    let pattern = PatternSpec::new(7, 5, 30.0).unwrap();
    let intrinsics = CameraIntrinsics::new(700.0, 690.0, 320.0, 240.0)
        .with_distortion([-0.15, 0.03, 0.001, -0.001, 0.0, 0.0, 0.0, 0.0]);
    let poses = vec![
        RvecTvec::new([0.1, -0.2, 0.05], [-90.0, -60.0, 600.0]),
        RvecTvec::new([-0.25, 0.1, -0.1], [-100.0, -50.0, 700.0]),
        RvecTvec::new([0.0, 0.0, 0.0], [-80.0, -60.0, 500.0]),
    ];
    (pattern, intrinsics, poses)
}

#[test]
fn test_view_error_formula() {
    assert_eq!(view_error(10.0, 4), 5.0);
    assert_eq!(aggregate_rms(100.0, 4), 5.0);
}

#[test]
fn test_perfect_projection_scores_zero() {
    let (pattern, intrinsics, poses) = setup();
    let views = synthetic_correspondences(&pattern, &intrinsics, &poses, 0.0, 0);
    let report = score(&views, &poses, &intrinsics).unwrap();
    assert_eq!(report.per_view_errors.len(), 3);
    // image points are stored as f32
    assert!(report.aggregate_rms < 1e-3);
    assert!(report.per_view_errors.iter().all(|e| *e < 1e-3));
}

#[test]
fn test_known_offset() {
    let (pattern, intrinsics, poses) = setup();
    let mut views = synthetic_correspondences(&pattern, &intrinsics, &poses[..1], 0.0, 0);
    for p in views[0].image_points.iter_mut() {
        *p += Vec2::new(3.0, 4.0);
    }
    let report = score(&views, &poses[..1], &intrinsics).unwrap();
    // every point is 5 px off, so err = 5 * sqrt(n) and the view error is 5
    assert!((report.per_view_errors[0] - 5.0).abs() < 1e-3);
    assert!((report.aggregate_rms - 5.0).abs() < 1e-3);
}

#[test]
fn test_aggregate_weights_by_point_count() {
    let (pattern, intrinsics, poses) = setup();
    let mut views = synthetic_correspondences(&pattern, &intrinsics, &poses[..2], 0.0, 0);
    for p in views[0].image_points.iter_mut() {
        p.x += 2.0;
    }
    let report = score(&views, &poses[..2], &intrinsics).unwrap();
    assert!((report.per_view_errors[0] - 2.0).abs() < 1e-3);
    assert!(report.per_view_errors[1] < 1e-3);
    assert!((report.aggregate_rms - 2.0f64.sqrt()).abs() < 1e-3);
}

#[test]
fn test_scoring_is_idempotent() {
    let (pattern, intrinsics, poses) = setup();
    let views = synthetic_correspondences(&pattern, &intrinsics, &poses, 0.5, 3);
    let a = score(&views, &poses, &intrinsics).unwrap();
    let b = score(&views, &poses, &intrinsics).unwrap();
    assert_eq!(a, b);
    assert!(a.aggregate_rms > 0.1);
}

#[test]
fn test_shape_errors() {
    let (pattern, intrinsics, poses) = setup();
    let views = synthetic_correspondences(&pattern, &intrinsics, &poses, 0.0, 0);
    assert!(matches!(
        score(&views, &poses[..2], &intrinsics),
        Err(CalibError::ShapeMismatch(_))
    ));
    assert!(matches!(
        score(&Vec::new(), &[], &intrinsics),
        Err(CalibError::InsufficientData)
    ));

    let mut broken = views.clone();
    broken[1].image_points.pop();
    assert!(matches!(
        score(&broken, &poses, &intrinsics),
        Err(CalibError::ShapeMismatch(_))
    ));
}
