use checkerboard_calibration::CalibError;
use checkerboard_calibration::board::PatternSpec;
use checkerboard_calibration::optimization::{
    CalibrationSolver, LmCalibrationSolver, SolverInput, SolverOutput, find_homography,
    focal_from_homographies, init_camera_matrix, init_pose,
};
use checkerboard_calibration::reprojection::score;
use checkerboard_calibration::synthetic::{random_views, synthetic_correspondences};
use checkerboard_calibration::types::{CameraIntrinsics, RvecTvec};
use nalgebra as na;

fn true_intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::new(800.0, 780.0, 330.0, 245.0)
        .with_distortion([-0.1, 0.02, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
}

fn homography_from_pose(k: &na::Matrix3<f64>, pose: &RvecTvec) -> na::Matrix3<f64> {
    let rot = na::Rotation3::from_scaled_axis(pose.na_rvec());
    let r = rot.matrix();
    let t = pose.na_tvec();
    k * na::Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t])
}

fn plane_grid() -> Vec<na::Vector2<f64>> {
    let mut pts = Vec::new();
    for r in 0..5 {
        for c in 0..7 {
            pts.push(na::Vector2::new(c as f64 * 20.0, r as f64 * 20.0));
        }
    }
    pts
}

#[test]
fn test_homography_recovery() {
    let k = true_intrinsics().camera_matrix();
    let pose = RvecTvec::new([0.2, -0.1, 0.05], [-60.0, -40.0, 400.0]);
    let h_true = homography_from_pose(&k, &pose);
    let src = plane_grid();
    let dst: Vec<_> = src
        .iter()
        .map(|p| {
            let q = h_true * na::Vector3::new(p.x, p.y, 1.0);
            na::Vector2::new(q.x / q.z, q.y / q.z)
        })
        .collect();

    let h = find_homography(&src, &dst).unwrap();
    for (s, d) in src.iter().zip(&dst) {
        let q = h * na::Vector3::new(s.x, s.y, 1.0);
        assert!((q.x / q.z - d.x).abs() < 1e-6);
        assert!((q.y / q.z - d.y).abs() < 1e-6);
    }
}

#[test]
fn test_homography_needs_four_points() {
    let src = plane_grid();
    assert!(find_homography(&src[..3], &src[..3]).is_none());
    assert!(find_homography(&src[..5], &src[..4]).is_none());
}

#[test]
fn test_init_pose_recovers_view() {
    let k = true_intrinsics().camera_matrix();
    let pose = RvecTvec::new([-0.15, 0.25, 0.1], [-50.0, -30.0, 500.0]);
    // any non-zero scale, including a negative one
    let h = homography_from_pose(&k, &pose) * -3.7;
    let recovered = init_pose(&h, &k).unwrap();
    for i in 0..3 {
        assert!((recovered.rvec[i] - pose.rvec[i]).abs() < 1e-9);
        assert!((recovered.tvec[i] - pose.tvec[i]).abs() < 1e-6);
    }
}

#[test]
fn test_focal_from_homographies() {
    let k = na::Matrix3::new(800.0, 0.0, 320.0, 0.0, 760.0, 240.0, 0.0, 0.0, 1.0);
    let poses = [
        RvecTvec::new([0.3, 0.0, 0.0], [-60.0, -40.0, 400.0]),
        RvecTvec::new([0.0, -0.3, 0.1], [-60.0, -40.0, 450.0]),
        RvecTvec::new([0.2, 0.2, -0.1], [-60.0, -40.0, 500.0]),
    ];
    let hs: Vec<_> = poses.iter().map(|p| homography_from_pose(&k, p)).collect();
    let (fx, fy) = focal_from_homographies(&hs, 320.0, 240.0).unwrap();
    assert!((fx - 800.0).abs() < 1e-4);
    assert!((fy - 760.0).abs() < 1e-4);
}

#[test]
fn test_fronto_parallel_views_have_no_focal() {
    let k = na::Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0);
    let pose = RvecTvec::new([0.0, 0.0, 0.0], [-60.0, -40.0, 400.0]);
    let hs = vec![homography_from_pose(&k, &pose)];
    assert!(focal_from_homographies(&hs, 320.0, 240.0).is_none());
}

#[test]
fn test_init_camera_matrix_centre() {
    let k = na::Matrix3::new(800.0, 0.0, 320.0, 0.0, 760.0, 240.0, 0.0, 0.0, 1.0);
    let poses = [
        RvecTvec::new([0.3, 0.0, 0.0], [-60.0, -40.0, 400.0]),
        RvecTvec::new([0.0, -0.3, 0.1], [-60.0, -40.0, 450.0]),
    ];
    let hs: Vec<_> = poses.iter().map(|p| homography_from_pose(&k, p)).collect();
    let init = init_camera_matrix(&hs, (640, 480));
    assert_eq!(init[(0, 2)], 320.0);
    assert_eq!(init[(1, 2)], 240.0);
    assert!((init[(0, 0)] - 800.0).abs() < 1e-4);
    assert!((init[(1, 1)] - 760.0).abs() < 1e-4);

    // odd sizes round the centre down
    let fronto = [homography_from_pose(&k, &RvecTvec::new([0.0; 3], [-60.0, -40.0, 400.0]))];
    let fallback = init_camera_matrix(&fronto, (641, 481));
    assert_eq!(fallback[(0, 2)], 320.0);
    assert_eq!(fallback[(1, 2)], 240.0);
    assert_eq!(fallback[(0, 0)], 641.0);
    assert_eq!(fallback[(1, 1)], 641.0);
}

#[test]
fn test_lm_recovers_intrinsics() {
    let pattern = PatternSpec::new(9, 6, 25.0).unwrap();
    let truth = true_intrinsics();
    let image_size = (640, 480);
    let poses = random_views(&pattern, &truth, image_size, 10, 7);
    assert!(poses.len() >= 8);
    let views = synthetic_correspondences(&pattern, &truth, &poses, 0.0, 0);

    let world: Vec<_> = views.iter().map(|v| v.world_points.clone()).collect();
    let image: Vec<_> = views.iter().map(|v| v.image_points.clone()).collect();
    let input = SolverInput {
        world_points: &world,
        image_points: &image,
        image_size,
        initial_guess: None,
    };
    let output = LmCalibrationSolver::default().solve(&input).unwrap();
    assert_eq!(output.distortion.len(), 5);
    assert_eq!(output.rvecs.len(), poses.len());

    let k = output.intrinsics();
    assert!((k.fx - truth.fx).abs() < 2.0);
    assert!((k.fy - truth.fy).abs() < 2.0);
    assert!((k.cx - truth.cx).abs() < 2.0);
    assert!((k.cy - truth.cy).abs() < 2.0);
    assert!((k.distortion[0] - truth.distortion[0]).abs() < 0.02);
    assert!((k.distortion[1] - truth.distortion[1]).abs() < 0.05);
    assert!(k.distortion[5..].iter().all(|d| *d == 0.0));

    let report = score(&views, &output.poses(), &k).unwrap();
    assert!(report.aggregate_rms < 0.05);
}

#[test]
fn test_lm_starts_from_guess() {
    let pattern = PatternSpec::new(7, 5, 30.0).unwrap();
    let truth = true_intrinsics();
    let image_size = (640, 480);
    let poses = random_views(&pattern, &truth, image_size, 6, 11);
    let views = synthetic_correspondences(&pattern, &truth, &poses, 0.0, 0);
    let world: Vec<_> = views.iter().map(|v| v.world_points.clone()).collect();
    let image: Vec<_> = views.iter().map(|v| v.image_points.clone()).collect();

    let guess = CameraIntrinsics::new(760.0, 760.0, 320.0, 240.0);
    let input = SolverInput {
        world_points: &world,
        image_points: &image,
        image_size,
        initial_guess: Some(&guess),
    };
    let solver = LmCalibrationSolver {
        max_iterations: 200,
        rational_model: true,
    };
    let output = solver.solve(&input).unwrap();
    assert_eq!(output.distortion.len(), 8);
    let report = score(&views, &output.poses(), &output.intrinsics()).unwrap();
    assert!(report.aggregate_rms < 0.1);
}

#[test]
fn test_solver_rejects_bad_input() {
    let solver = LmCalibrationSolver::default();
    let empty = SolverInput {
        world_points: &[],
        image_points: &[],
        image_size: (640, 480),
        initial_guess: None,
    };
    assert!(matches!(solver.solve(&empty), Err(CalibError::InsufficientData)));

    let world = vec![vec![glam::Vec3::ZERO; 6]];
    let image = vec![vec![glam::Vec2::ZERO; 5]];
    let mismatched = SolverInput {
        world_points: &world,
        image_points: &image,
        image_size: (640, 480),
        initial_guess: None,
    };
    assert!(matches!(
        solver.solve(&mismatched),
        Err(CalibError::ShapeMismatch(_))
    ));
}

#[test]
fn test_solver_output_pads_distortion() {
    let output = SolverOutput {
        camera_matrix: na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 510.0, 240.0, 0.0, 0.0, 1.0),
        distortion: vec![0.1, -0.2, 0.001, 0.002, 0.03],
        rvecs: vec![[0.0, 0.1, 0.2]],
        tvecs: vec![[1.0, 2.0, 3.0]],
    };
    let k = output.intrinsics();
    assert_eq!(k.fx, 500.0);
    assert_eq!(k.fy, 510.0);
    assert_eq!(k.distortion, [0.1, -0.2, 0.001, 0.002, 0.03, 0.0, 0.0, 0.0]);
    let poses = output.poses();
    assert_eq!(poses[0].tvec, [1.0, 2.0, 3.0]);
}
