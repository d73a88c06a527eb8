use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::calibrate::CalibrationOutput;
use crate::error::Result;
use crate::sensor::SensorSpec;
use crate::types::{CameraIntrinsics, DISTORTION_LEN};

pub const CALIBRATION_FILE: &str = "camera_calibration.json";
pub const VIEWS_FILE: &str = "calibration_views.json";
pub const REPORT_FILE: &str = "calibration_report.txt";
pub const INTRINSIC_FILE: &str = "camera_intrinsic.json";

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &str, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Camera matrix and distortion as written to [`CALIBRATION_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion_coefficients: [f64; DISTORTION_LEN],
    pub image_size: (u32, u32),
    pub rms: f64,
    pub per_view_errors: Vec<f64>,
}

impl CalibrationRecord {
    pub fn from_output(output: &CalibrationOutput) -> CalibrationRecord {
        let k = output.intrinsics.camera_matrix();
        CalibrationRecord {
            camera_matrix: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            distortion_coefficients: output.intrinsics.distortion,
            image_size: output.image_size,
            rms: output.error_report.aggregate_rms,
            per_view_errors: output.error_report.per_view_errors.clone(),
        }
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        let k = self.camera_matrix;
        CameraIntrinsics::new(k[0][0], k[1][1], k[0][2], k[1][2])
            .with_distortion(self.distortion_coefficients)
    }
}

/// Per-view data consumed by homography and stereo tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewsRecord {
    pub image_indices: Vec<usize>,
    pub rvecs: Vec<[f64; 3]>,
    pub tvecs: Vec<[f64; 3]>,
    pub object_points: Vec<Vec<glam::Vec3>>,
    pub image_points: Vec<Vec<glam::Vec2>>,
}

impl ViewsRecord {
    pub fn from_output(output: &CalibrationOutput) -> ViewsRecord {
        let c = &output.correspondences;
        ViewsRecord {
            image_indices: c.iter().map(|f| f.image_index).collect(),
            rvecs: output.poses.iter().map(|p| p.rvec).collect(),
            tvecs: output.poses.iter().map(|p| p.tvec).collect(),
            object_points: c.iter().map(|f| f.world_points.clone()).collect(),
            image_points: c.iter().map(|f| f.image_points.clone()).collect(),
        }
    }
}

/// Synthesized intrinsics next to the sensor they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicRecord {
    pub header: String,
    pub sensor: SensorSpec,
    pub camera_matrix: [[f64; 3]; 3],
}

fn path_in(dir: &str, name: &str) -> String {
    Path::new(dir).join(name).to_string_lossy().to_string()
}

fn timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let format = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    );
    now.format(&format).unwrap_or_else(|_| now.to_string())
}

/// Writes the calibration, the per-view data and a text report into `output_dir`.
pub fn save_calibration(output_dir: &str, output: &CalibrationOutput) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    object_to_json(
        &path_in(output_dir, CALIBRATION_FILE),
        &CalibrationRecord::from_output(output),
    )?;
    object_to_json(&path_in(output_dir, VIEWS_FILE), &ViewsRecord::from_output(output))?;
    write_report(&path_in(output_dir, REPORT_FILE), output)
}

pub fn write_report(output_path: &str, output: &CalibrationOutput) -> Result<()> {
    let k = &output.intrinsics;
    let mut s = String::new();
    s += format!("Calibrated at {}\n", timestamp()).as_str();
    s += format!(
        "image size: {}x{}, views: {}, rejected images: {:?}\n\n",
        output.image_size.0,
        output.image_size.1,
        output.correspondences.len(),
        output.rejected_images
    )
    .as_str();
    s += format!("fx: {:.5}\nfy: {:.5}\ncx: {:.5}\ncy: {:.5}\n", k.fx, k.fy, k.cx, k.cy).as_str();
    s += format!("distortion: {:?}\n\n", k.distortion).as_str();
    s += format!(
        "reprojection rms: {:.5} px\n",
        output.error_report.aggregate_rms
    )
    .as_str();
    for (frame, e) in output
        .correspondences
        .iter()
        .zip(&output.error_report.per_view_errors)
    {
        s += format!("    image {:4}: {:.5} px\n", frame.image_index, e).as_str();
    }
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(s.as_bytes())?;
    Ok(())
}

/// Writes [`INTRINSIC_FILE`] into `output_dir`.
pub fn save_intrinsic_parameters(
    output_dir: &str,
    header: &str,
    sensor: &SensorSpec,
    intrinsics: &CameraIntrinsics,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let k = intrinsics.camera_matrix();
    let record = IntrinsicRecord {
        header: header.to_string(),
        sensor: *sensor,
        camera_matrix: [
            [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
            [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
            [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
        ],
    };
    object_to_json(&path_in(output_dir, INTRINSIC_FILE), &record)
}
