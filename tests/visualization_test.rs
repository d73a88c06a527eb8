use checkerboard_calibration::board::PatternSpec;
use checkerboard_calibration::synthetic::synthetic_correspondences;
use checkerboard_calibration::types::{CameraIntrinsics, RvecTvec};
use checkerboard_calibration::visualization::{
    draw_chessboard_corners, id_to_color, log_correspondences, rerun_shift,
};
use glam::Vec2;
use image::{DynamicImage, GrayImage, Luma, Rgb};

fn blank() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 150, Luma([128])))
}

#[test]
fn test_id_to_color_is_deterministic() {
    assert_eq!(id_to_color(3), id_to_color(3));
    assert_eq!(id_to_color(3).3, 255);
    assert_ne!(id_to_color(3), id_to_color(4));
}

#[test]
fn test_rerun_shift() {
    let shifted = rerun_shift(&[(0.0, 0.0), (10.0, 5.0)]);
    assert_eq!(shifted, vec![(0.5, 0.5), (10.5, 5.5)]);
}

#[test]
fn test_found_overlay_marks_corners() {
    let pattern = PatternSpec::new(3, 2, 10.0).unwrap();
    let corners: Vec<Vec2> = (0..2)
        .flat_map(|r| (0..3).map(move |c| Vec2::new(50.0 + 40.0 * c as f32, 50.0 + 40.0 * r as f32)))
        .collect();
    let image = blank();
    let overlay = draw_chessboard_corners(&image, &pattern, &corners, true);
    assert_eq!(overlay.dimensions(), (200, 150));

    let grey = Rgb([128, 128, 128]);
    // circle around the first corner and the polyline between the first two
    assert_ne!(*overlay.get_pixel(54, 50), grey);
    assert_ne!(*overlay.get_pixel(70, 50), grey);
    // far from every corner and line
    assert_eq!(*overlay.get_pixel(10, 140), grey);
    // the input is not modified
    assert_eq!(image.to_rgb8().get_pixel(54, 50), &grey);
}

#[test]
fn test_not_found_overlay_is_red() {
    let pattern = PatternSpec::new(3, 2, 10.0).unwrap();
    let corners = vec![Vec2::new(100.0, 75.0)];
    let overlay = draw_chessboard_corners(&blank(), &pattern, &corners, false);
    assert_eq!(*overlay.get_pixel(100, 75), Rgb([255, 0, 0]));
    assert_eq!(*overlay.get_pixel(104, 75), Rgb([255, 0, 0]));
}

#[test]
fn test_overlay_clips_outside_corners() {
    let pattern = PatternSpec::new(2, 2, 10.0).unwrap();
    let corners = vec![
        Vec2::new(-20.0, -20.0),
        Vec2::new(199.0, 0.0),
        Vec2::new(0.0, 149.0),
        Vec2::new(500.0, 500.0),
    ];
    let overlay = draw_chessboard_corners(&blank(), &pattern, &corners, true);
    assert_eq!(overlay.dimensions(), (200, 150));
}

#[test]
fn test_logging_to_disabled_stream() {
    let pattern = PatternSpec::new(4, 3, 10.0).unwrap();
    let intrinsics = CameraIntrinsics::new(300.0, 300.0, 160.0, 120.0);
    let poses = [RvecTvec::new([0.0, 0.0, 0.0], [-15.0, -10.0, 100.0])];
    let views = synthetic_correspondences(&pattern, &intrinsics, &poses, 0.0, 0);
    let recording = rerun::RecordingStream::disabled();
    log_correspondences(&recording, "test", &views);
}
