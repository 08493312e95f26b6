use std::{error::Error, path::PathBuf, process::ExitCode};

use calib_measure::chessboard::ChessboardDetector;
use calib_measure::core::BoardSpec;
use calib_measure::pipeline::{self, CalibrationRun, MeasurementRun};
use calib_measure::{LargestEdgeRegionLocator, PipelineConfig};
use clap::{Args, Parser, Subcommand};

/// Planar checkerboard calibration and monocular width measurement.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON PipelineConfig. Defaults are used if omitted; flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Calibration artifact path.
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate from a directory of checkerboard images.
    Calibrate(CalibrateArgs),
    /// Estimate an object's width with a saved calibration.
    Measure(MeasureArgs),
    /// Calibrate, then measure.
    Run {
        #[command(flatten)]
        calibrate: CalibrateArgs,
        #[command(flatten)]
        measure: MeasureArgs,
    },
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    /// Directory with calibration images.
    #[arg(long)]
    images: Option<PathBuf>,
    /// Inner corners along the board columns.
    #[arg(long)]
    cols: Option<u32>,
    /// Inner corners along the board rows.
    #[arg(long)]
    rows: Option<u32>,
    /// Square edge length (millimeters).
    #[arg(long)]
    square_size: Option<f64>,
    /// Minimal number of images with a detected board.
    #[arg(long)]
    min_views: Option<usize>,
}

#[derive(Debug, Args)]
struct MeasureArgs {
    /// Photograph of the object.
    #[arg(long)]
    object_image: Option<PathBuf>,
    /// Camera-to-object distance along the optical axis.
    #[arg(long)]
    distance: Option<f64>,
    /// Ground-truth object width, same unit as the distance.
    #[arg(long)]
    actual_width: Option<f64>,
    /// Object width in pixels; skips locating the object in the image.
    #[arg(long)]
    pixel_width: Option<f64>,
}

impl CalibrateArgs {
    fn apply(&self, config: &mut PipelineConfig) -> Result<(), Box<dyn Error>> {
        if let Some(images) = &self.images {
            config.images_dir = images.clone();
        }
        config.board = BoardSpec::new(
            self.cols.unwrap_or(config.board.cols),
            self.rows.unwrap_or(config.board.rows),
            self.square_size.unwrap_or(config.board.square_size),
        )?;
        if let Some(min_views) = self.min_views {
            config.calibration.min_views = min_views;
        }
        Ok(())
    }
}

impl MeasureArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.object_image {
            config.object_image = path.clone();
        }
        if let Some(distance) = self.distance {
            config.distance = distance;
        }
        if let Some(actual_width) = self.actual_width {
            config.actual_width = actual_width;
        }
        if let Some(pixel_width) = self.pixel_width {
            config.pixel_width = Some(pixel_width);
        }
    }
}

fn init_logging(verbosity: u8) {
    #[cfg(feature = "tracing")]
    {
        use calib_measure::core::{init_tracing, level_from_verbosity};
        let level = level_from_verbosity(verbosity);
        init_tracing(false, level);
        if let Err(err) = tracing_log::LogTracer::init_with_filter(level) {
            eprintln!("failed to bridge log records: {err}");
        }
    }
    #[cfg(not(feature = "tracing"))]
    {
        use calib_measure::core::{init_with_level, level_from_verbosity};
        let _ = init_with_level(level_from_verbosity(verbosity));
    }
}

fn print_calibration(run: &CalibrationRun) {
    let valid = run.images.iter().filter(|r| r.is_ok()).count();
    let k = run.result.camera.intrinsics;
    let d = run.result.camera.distortion;
    println!("\nTotal valid calibration images used: {valid}");
    println!("\nCamera matrix:");
    println!("  [{:12.4} {:12.4} {:12.4}]", k.fx, 0.0, k.cx);
    println!("  [{:12.4} {:12.4} {:12.4}]", 0.0, k.fy, k.cy);
    println!("  [{:12.4} {:12.4} {:12.4}]", 0.0, 0.0, 1.0);
    println!(
        "\nDistortion coefficients (k1, k2, p1, p2, k3):\n  [{:.6}, {:.6}, {:.6}, {:.6}, {:.6}]",
        d.k1, d.k2, d.p1, d.p2, d.k3
    );
    println!(
        "\nRMS reprojection error: {:.4} px",
        run.artifact.rms_reprojection_error
    );
}

fn print_measurement(run: &MeasurementRun) {
    println!("Focal length (pixels): {:.4}", run.fx);
    if let Some(bbox) = run.bbox {
        println!(
            "Object box: x={} y={} w={} h={}",
            bbox.x, bbox.y, bbox.width, bbox.height
        );
    }
    let m = &run.measurement;
    println!("Pixel width: {:.2}", run.pixel_width);
    println!("Estimated width: {:.4}", m.estimated_width);
    println!("Actual width: {:.4}", m.actual_width);
    println!("Percentage error: {:.4} %", m.percent_error);
}

fn calibrate(config: &PipelineConfig) -> Result<(), Box<dyn Error>> {
    println!("=== STEP 1: CAMERA CALIBRATION ===");
    let detector = ChessboardDetector::new(config.detector.clone());
    let run = pipeline::run_calibration_with(config, &detector, |report| println!("{report}"))?;
    print_calibration(&run);
    println!(
        "\nCalibration data saved to {}",
        config.artifact_path.display()
    );
    Ok(())
}

fn measure(config: &PipelineConfig) -> Result<(), Box<dyn Error>> {
    println!("=== STEP 2: REAL-WORLD MEASUREMENT ===");
    let locator = LargestEdgeRegionLocator::new(config.locator.clone());
    let run = pipeline::run_measurement(config, &locator, None)?;
    print_measurement(&run);
    Ok(())
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load_json(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(artifact) = &cli.artifact {
        config.artifact_path = artifact.clone();
    }

    match &cli.command {
        Command::Calibrate(args) => {
            args.apply(&mut config)?;
            calibrate(&config)
        }
        Command::Measure(args) => {
            args.apply(&mut config);
            measure(&config)
        }
        Command::Run {
            calibrate: cal,
            measure: meas,
        } => {
            cal.apply(&mut config)?;
            meas.apply(&mut config);
            calibrate(&config)?;
            println!();
            measure(&config)
        }
    }
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
