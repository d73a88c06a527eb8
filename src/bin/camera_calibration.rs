use checkerboard_calibration::calibrate::{calibrate_detected, collect_correspondences};
use checkerboard_calibration::config::{CalibConfig, DEFAULT_CONFIG_FILE};
use checkerboard_calibration::data_loader::load_images;
use checkerboard_calibration::detector::{ChessboardCornerSearch, CornerViewer};
use checkerboard_calibration::io::{save_calibration, save_intrinsic_parameters};
use checkerboard_calibration::optimization::LmCalibrationSolver;
use checkerboard_calibration::sensor::synthesize;
use checkerboard_calibration::visualization::{BlockingViewer, log_correspondences};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// read the configuration file
    Load,
    /// write the configuration file from the flags, then calibrate
    Create,
    /// calibrate from the flags only
    Flags,
}

#[derive(Parser)]
#[command(version, about, author)]
struct CcalCli {
    #[arg(long, value_enum, default_value = "load")]
    mode: Mode,

    /// configuration file used by `load` and `create`
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// folder with the calibration pictures
    #[arg(long)]
    path: Option<String>,

    /// square edge length in mm
    #[arg(long)]
    square_size: Option<f64>,

    /// number of squares along x
    #[arg(long)]
    squares_x: Option<u32>,

    /// number of squares along y
    #[arg(long)]
    squares_y: Option<u32>,

    /// pixel pitch in mm
    #[arg(long)]
    px: Option<f64>,
    #[arg(long)]
    py: Option<f64>,

    /// max sensor resolution
    #[arg(long)]
    maxresx: Option<u32>,
    #[arg(long)]
    maxresy: Option<u32>,

    /// resolution of the pictures
    #[arg(long)]
    currresx: Option<u32>,
    #[arg(long)]
    currresy: Option<u32>,

    /// focal length in mm, 0 disables the sensor model
    #[arg(long)]
    focal: Option<f64>,

    #[arg(long, default_value = "calibration_output")]
    output: String,

    /// show every detection and wait for Enter
    #[arg(long, action)]
    show_corners: bool,

    /// calibrate even with fewer pictures than configured
    #[arg(long, action)]
    force: bool,

    /// start the solver from the sensor intrinsics
    #[arg(long, action)]
    use_sensor_guess: bool,

    /// also estimate k4, k5, k6
    #[arg(long, action)]
    rational_model: bool,

    #[arg(long, default_value = "100")]
    max_iterations: usize,
}

impl CcalCli {
    fn apply_flags(&self, mut config: CalibConfig) -> CalibConfig {
        if let Some(v) = &self.path {
            config.path_to_calib_pics = v.clone();
        }
        if let Some(v) = self.square_size {
            config.calibration_square_size = v;
        }
        if let Some(v) = self.squares_x {
            config.chessboard_width = v;
        }
        if let Some(v) = self.squares_y {
            config.chessboard_height = v;
        }
        if let Some(v) = self.px {
            config.pixel_size.0 = v;
        }
        if let Some(v) = self.py {
            config.pixel_size.1 = v;
        }
        if let Some(v) = self.maxresx {
            config.matrix_max_res.0 = v;
        }
        if let Some(v) = self.maxresy {
            config.matrix_max_res.1 = v;
        }
        if let Some(v) = self.currresx {
            config.matrix_curr_res.0 = v;
        }
        if let Some(v) = self.currresy {
            config.matrix_curr_res.1 = v;
        }
        if let Some(v) = self.focal {
            config.focal_length = v;
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = CcalCli::parse();

    let config = match cli.mode {
        Mode::Load => CalibConfig::load(&cli.config)?,
        Mode::Create => {
            let config = cli.apply_flags(CalibConfig::default());
            config.save(&cli.config)?;
            info!("wrote {}", cli.config);
            config
        }
        Mode::Flags => cli.apply_flags(CalibConfig::default()),
    };
    let ctx = config.to_context()?.with_sensor_guess(cli.use_sensor_guess);

    if let Some(sensor) = &ctx.sensor {
        let intrinsics = synthesize(sensor)?;
        save_intrinsic_parameters(&cli.output, &config.header, sensor, &intrinsics)?;
        info!(
            "sensor intrinsics fx {:.3} fy {:.3} cx {} cy {}",
            intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy
        );
    }

    let now = Instant::now();
    let (paths, images) = load_images(&config.path_to_calib_pics)?;
    info!("loaded {} images in {:.3} sec", images.len(), now.elapsed().as_secs_f64());

    let recording = if cli.show_corners {
        Some(rerun::RecordingStreamBuilder::new("ccal").spawn()?)
    } else {
        None
    };
    let viewer = recording.clone().map(BlockingViewer::new);
    let search = ChessboardCornerSearch::default();

    let now = Instant::now();
    let summary = collect_correspondences(
        &images,
        &ctx,
        &search,
        viewer.as_ref().map(|v| v as &dyn CornerViewer),
    );
    info!("detecting corners took {:.3} sec", now.elapsed().as_secs_f64());
    for idx in &summary.rejected_images {
        warn!("rejected {}", paths[*idx].display());
    }

    let found = summary.correspondences.len();
    if found < ctx.min_images && !cli.force {
        return Err(format!(
            "chessboard found in {} pictures, {} needed (use --force to calibrate anyway)",
            found, ctx.min_images
        )
        .into());
    }

    let solver = LmCalibrationSolver {
        max_iterations: cli.max_iterations,
        rational_model: cli.rational_model,
    };
    let output = calibrate_detected(summary, &ctx, &solver)?;
    if let Some(recording) = &recording {
        log_correspondences(recording, "calibration", &output.correspondences);
    }
    save_calibration(&cli.output, &output)?;

    let k = &output.intrinsics;
    println!("camera matrix:\n{}", k.camera_matrix());
    println!("distortion: {:?}", k.distortion);
    println!("reprojection rms: {:.5} px", output.error_report.aggregate_rms);
    println!("results written to {}", cli.output);
    Ok(())
}
