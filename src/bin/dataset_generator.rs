use checkerboard_calibration::board::PatternSpec;
use checkerboard_calibration::config::CalibConfig;
use checkerboard_calibration::io::object_to_json;
use checkerboard_calibration::synthetic::{random_views, render_chessboard};
use checkerboard_calibration::types::{CameraIntrinsics, RvecTvec};
use clap::Parser;
use indicatif::ParallelProgressIterator;
use log::info;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

#[derive(Parser)]
#[command(author, version, about = "Render a synthetic checkerboard dataset", long_about = None)]
struct Args {
    /// Output directory
    #[arg(short, long)]
    output: String,

    /// Interior corners along x
    #[arg(long, default_value = "9")]
    corners_x: u32,

    /// Interior corners along y
    #[arg(long, default_value = "6")]
    corners_y: u32,

    /// Square edge length in mm
    #[arg(long, default_value = "25.0")]
    square_size: f64,

    /// Number of frames to generate
    #[arg(short, long, default_value = "20")]
    num_frames: usize,

    #[arg(long, default_value = "640")]
    width: u32,

    #[arg(long, default_value = "480")]
    height: u32,

    #[arg(long, default_value = "600.0")]
    fx: f64,

    #[arg(long, default_value = "600.0")]
    fy: f64,

    /// k1 k2 p1 p2 k3
    #[arg(long, num_args = 5, allow_negative_numbers = true)]
    distortion: Option<Vec<f64>>,

    #[arg(long, default_value = "0")]
    seed: u64,
}

#[derive(Serialize)]
struct GroundTruth {
    intrinsics: CameraIntrinsics,
    image_size: (u32, u32),
    poses: Vec<RvecTvec>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let pattern = PatternSpec::new(args.corners_x, args.corners_y, args.square_size)?;
    let image_size = (args.width, args.height);
    let mut distortion = [0.0; 8];
    if let Some(d) = &args.distortion {
        distortion[..d.len()].copy_from_slice(d);
    }
    let intrinsics = CameraIntrinsics::new(
        args.fx,
        args.fy,
        (args.width as f64 - 1.0) * 0.5,
        (args.height as f64 - 1.0) * 0.5,
    )
    .with_distortion(distortion);

    std::fs::create_dir_all(&args.output)?;
    let poses = random_views(&pattern, &intrinsics, image_size, args.num_frames, args.seed);
    if poses.len() < args.num_frames {
        log::warn!("only {} of {} poses fit the image", poses.len(), args.num_frames);
    }

    poses
        .par_iter()
        .enumerate()
        .progress_count(poses.len() as u64)
        .try_for_each(|(idx, pose)| {
            let img = render_chessboard(&pattern, &intrinsics, pose, image_size);
            img.save(Path::new(&args.output).join(format!("calib_pic_{:03}.png", idx)))
        })?;

    let truth = GroundTruth {
        intrinsics,
        image_size,
        poses,
    };
    let truth_path = Path::new(&args.output).join("ground_truth.json");
    object_to_json(&truth_path.to_string_lossy(), &truth)?;

    let config = CalibConfig {
        header: "synthetic".to_string(),
        path_to_calib_pics: args.output.clone(),
        calibration_square_size: args.square_size,
        chessboard_width: args.corners_x + 1,
        chessboard_height: args.corners_y + 1,
        matrix_curr_res: image_size,
        focal_length: 0.0,
        min_amount_of_pics_to_calibrate: args.num_frames.min(20),
        ..CalibConfig::default()
    };
    let config_path = Path::new(&args.output).join("calib_conf.json");
    config.save(&config_path.to_string_lossy())?;

    info!("generated {} frames in {}", truth.poses.len(), args.output);
    Ok(())
}
