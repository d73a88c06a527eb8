use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};
use crate::types::CameraIntrinsics;

/// Physical description of the image sensor and lens.
///
/// `pixel_size`, `sensor_size` and `focal_length` share one length unit
/// (millimetres in the shipped configs).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub pixel_size: (f64, f64),
    pub max_resolution: (u32, u32),
    pub current_resolution: (u32, u32),
    pub sensor_size: (f64, f64),
    pub focal_length: f64,
}

impl SensorSpec {
    /// Derives the sensor size as `max_resolution * pixel_size`.
    pub fn from_pixel_pitch(
        pixel_size: (f64, f64),
        max_resolution: (u32, u32),
        current_resolution: (u32, u32),
        focal_length: f64,
    ) -> SensorSpec {
        SensorSpec {
            pixel_size,
            max_resolution,
            current_resolution,
            sensor_size: (
                max_resolution.0 as f64 * pixel_size.0,
                max_resolution.1 as f64 * pixel_size.1,
            ),
            focal_length,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (sx, sy) = self.sensor_size;
        if !(sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0) {
            return Err(CalibError::InvalidSensorSpec(format!(
                "sensor size must be positive, got ({}, {})",
                sx, sy
            )));
        }
        if !(self.focal_length.is_finite() && self.focal_length > 0.0) {
            return Err(CalibError::InvalidSensorSpec(format!(
                "focal length must be positive, got {}",
                self.focal_length
            )));
        }
        if self.current_resolution.0 == 0 || self.current_resolution.1 == 0 {
            return Err(CalibError::InvalidSensorSpec(format!(
                "current resolution must be non-zero, got {:?}",
                self.current_resolution
            )));
        }
        Ok(())
    }
}

/// Camera matrix implied by the sensor geometry, without any images.
///
/// The principal point is the image centre under integer division, so odd
/// resolutions truncate. Distortion is left at zero.
pub fn synthesize(sensor: &SensorSpec) -> Result<CameraIntrinsics> {
    sensor.validate()?;
    let (w, h) = sensor.current_resolution;
    let fx = w as f64 * sensor.focal_length / sensor.sensor_size.0;
    let fy = h as f64 * sensor.focal_length / sensor.sensor_size.1;
    let cx = (w / 2) as f64;
    let cy = (h / 2) as f64;
    Ok(CameraIntrinsics::new(fx, fy, cx, cy))
}
