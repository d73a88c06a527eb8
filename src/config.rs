use serde::{Deserialize, Serialize};

use crate::board::PatternSpec;
use crate::detector::SearchFlags;
use crate::error::Result;
use crate::io::{object_from_json, object_to_json};
use crate::sensor::SensorSpec;

pub const DEFAULT_MIN_IMAGES: usize = 20;
pub const DEFAULT_CONFIG_FILE: &str = "calib_conf.json";

fn default_min_images() -> usize {
    DEFAULT_MIN_IMAGES
}

/// Persisted calibration setup.
///
/// `chessboard_width` and `chessboard_height` count squares as printed on the
/// target; the interior corner grid is one smaller along each axis. Lengths are
/// in millimetres. `matrix_size` is the sensor size and is derived from the
/// pixel pitch when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibConfig {
    #[serde(default)]
    pub header: String,
    pub path_to_calib_pics: String,
    pub calibration_square_size: f64,
    pub chessboard_width: u32,
    pub chessboard_height: u32,
    pub pixel_size: (f64, f64),
    pub matrix_max_res: (u32, u32),
    pub matrix_curr_res: (u32, u32),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_size: Option<(f64, f64)>,
    /// Zero means no sensor description is available.
    pub focal_length: f64,
    #[serde(default = "default_min_images")]
    pub min_amount_of_pics_to_calibrate: usize,
}

impl Default for CalibConfig {
    fn default() -> Self {
        CalibConfig {
            header: "Raspberry Pi Camera 2.0 B".to_string(),
            path_to_calib_pics: "calib_pics".to_string(),
            calibration_square_size: 25.0,
            chessboard_width: 10,
            chessboard_height: 7,
            pixel_size: (0.00112, 0.00112),
            matrix_max_res: (3280, 2464),
            matrix_curr_res: (1920, 1080),
            matrix_size: None,
            focal_length: 3.04,
            min_amount_of_pics_to_calibrate: DEFAULT_MIN_IMAGES,
        }
    }
}

impl CalibConfig {
    pub fn load(path: &str) -> Result<CalibConfig> {
        object_from_json(path)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        object_to_json(path, self)
    }

    pub fn pattern(&self) -> Result<PatternSpec> {
        PatternSpec::from_square_counts(
            self.chessboard_width,
            self.chessboard_height,
            self.calibration_square_size,
        )
    }

    pub fn sensor(&self) -> SensorSpec {
        match self.matrix_size {
            Some(sensor_size) => SensorSpec {
                pixel_size: self.pixel_size,
                max_resolution: self.matrix_max_res,
                current_resolution: self.matrix_curr_res,
                sensor_size,
                focal_length: self.focal_length,
            },
            None => SensorSpec::from_pixel_pitch(
                self.pixel_size,
                self.matrix_max_res,
                self.matrix_curr_res,
                self.focal_length,
            ),
        }
    }

    /// Validates the record and freezes it into a [`CalibrationContext`].
    pub fn to_context(&self) -> Result<CalibrationContext> {
        let pattern = self.pattern()?;
        let sensor = if self.focal_length == 0.0 {
            None
        } else {
            let sensor = self.sensor();
            sensor.validate()?;
            Some(sensor)
        };
        Ok(CalibrationContext {
            pattern,
            sensor,
            min_images: self.min_amount_of_pics_to_calibrate,
            search_flags: SearchFlags::default(),
            use_sensor_guess: false,
        })
    }
}

/// Immutable parameters of one calibration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationContext {
    pub pattern: PatternSpec,
    pub sensor: Option<SensorSpec>,
    /// Below this many accepted views the result is considered unreliable.
    pub min_images: usize,
    pub search_flags: SearchFlags,
    /// Seed the solver with the intrinsics synthesized from `sensor`.
    pub use_sensor_guess: bool,
}

impl CalibrationContext {
    pub fn new(pattern: PatternSpec) -> CalibrationContext {
        CalibrationContext {
            pattern,
            sensor: None,
            min_images: DEFAULT_MIN_IMAGES,
            search_flags: SearchFlags::default(),
            use_sensor_guess: false,
        }
    }

    pub fn with_sensor(mut self, sensor: SensorSpec) -> CalibrationContext {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_min_images(mut self, min_images: usize) -> CalibrationContext {
        self.min_images = min_images;
        self
    }

    pub fn with_sensor_guess(mut self, use_sensor_guess: bool) -> CalibrationContext {
        self.use_sensor_guess = use_sensor_guess;
        self
    }

    pub fn with_search_flags(mut self, search_flags: SearchFlags) -> CalibrationContext {
        self.search_flags = search_flags;
        self
    }
}
