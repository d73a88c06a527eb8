use checkerboard_calibration::CalibError;
use checkerboard_calibration::sensor::{SensorSpec, synthesize};

fn spec(sensor_size: (f64, f64)) -> SensorSpec {
    SensorSpec {
        pixel_size: (0.0033, 0.0044),
        max_resolution: (1920, 1080),
        current_resolution: (1920, 1080),
        sensor_size,
        focal_length: 6.0,
    }
}

#[test]
fn test_synthesize_camera_matrix() {
    let k = synthesize(&spec((6.4, 4.8))).unwrap();
    assert!((k.fx - 1800.0).abs() < 1e-9);
    assert!((k.fy - 1350.0).abs() < 1e-9);
    assert_eq!(k.cx, 960.0);
    assert_eq!(k.cy, 540.0);
    assert!(k.distortion.iter().all(|d| *d == 0.0));

    let m = k.camera_matrix();
    assert_eq!(m[(0, 2)], 960.0);
    assert_eq!(m[(1, 2)], 540.0);
    assert_eq!(m[(2, 2)], 1.0);
    assert_eq!(m[(1, 0)], 0.0);
}

#[test]
fn test_principal_point_truncates() {
    let mut s = spec((6.4, 4.8));
    s.current_resolution = (641, 481);
    let k = synthesize(&s).unwrap();
    assert_eq!(k.cx, 320.0);
    assert_eq!(k.cy, 240.0);
}

#[test]
fn test_sensor_size_from_pixel_pitch() {
    let s = SensorSpec::from_pixel_pitch((0.002, 0.002), (3000, 2000), (1500, 1000), 4.0);
    assert!((s.sensor_size.0 - 6.0).abs() < 1e-12);
    assert!((s.sensor_size.1 - 4.0).abs() < 1e-12);
    let k = synthesize(&s).unwrap();
    assert!((k.fx - 1000.0).abs() < 1e-9);
}

#[test]
fn test_rejects_degenerate_sensor() {
    for size in [(0.0, 4.8), (6.4, -1.0), (f64::NAN, 4.8)] {
        assert!(matches!(
            synthesize(&spec(size)),
            Err(CalibError::InvalidSensorSpec(_))
        ));
    }
    let mut s = spec((6.4, 4.8));
    s.focal_length = 0.0;
    assert!(matches!(synthesize(&s), Err(CalibError::InvalidSensorSpec(_))));
}
