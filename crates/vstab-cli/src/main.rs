//! Command-line interface for vstab video stabilization.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use vstab::homography::HomographyMethod;
use vstab::video::DEFAULT_CODEC;
use vstab::{
    BoundaryMode, FfmpegSink, FfmpegSource, FrameGeometry, FrameSink, FrameSource,
    ImageSequenceSink, ImageSequenceSource, MotionFailurePolicy, StabilizeConfig, Stabilizer,
    VideoResult,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "vstab")]
#[command(about = "Stabilize shaky video by smoothing the estimated camera trajectory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stabilize a video file or a directory of frames.
    Stabilize(CliStabilizeArgs),

    /// Estimate and smooth the trajectory only, writing it as JSON.
    Trajectory(CliTrajectoryArgs),

    /// Print video stream information.
    Probe {
        /// Path to the input video.
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliStabilizeArgs {
    /// Input video file, or a directory of frame images.
    #[arg(long)]
    input: PathBuf,

    /// Output video file, or a directory for PNG frames.
    #[arg(long)]
    output: PathBuf,

    /// Path to write the run report (JSON).
    #[arg(long)]
    report: Option<PathBuf>,

    /// Video encoder passed to ffmpeg for file outputs.
    #[arg(long, default_value = DEFAULT_CODEC)]
    codec: String,

    /// Emit the first frame unwarped ahead of the corrected frames.
    #[arg(long)]
    keep_reference: bool,

    #[command(flatten)]
    tuning: CliTuningArgs,
}

#[derive(Debug, Clone, Args)]
struct CliTrajectoryArgs {
    /// Input video file, or a directory of frame images.
    #[arg(long)]
    input: PathBuf,

    /// Path to write the trajectory (JSON).
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    tuning: CliTuningArgs,
}

/// Pipeline settings. Flags override values loaded from `--config`.
#[derive(Debug, Clone, Args)]
struct CliTuningArgs {
    /// Stabilization config (JSON). Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Smoothing window length in frames.
    #[arg(long)]
    window: Option<usize>,

    /// Gaussian sigma in frames (derived from the window when omitted).
    #[arg(long)]
    sigma: Option<f64>,

    /// How the smoother fills samples beyond the ends of the trajectory.
    #[arg(long, value_enum)]
    boundary: Option<BoundaryArg>,

    /// Maximum number of corners detected per frame.
    #[arg(long)]
    max_corners: Option<usize>,

    /// Corner quality relative to the strongest corner, in (0, 1].
    #[arg(long)]
    quality_level: Option<f32>,

    /// Minimum spacing between corners in pixels.
    #[arg(long)]
    min_distance: Option<f32>,

    /// Homography fitting method.
    #[arg(long, value_enum)]
    homography: Option<HomographyArg>,

    /// RANSAC inlier threshold in pixels.
    #[arg(long)]
    ransac_thresh_px: Option<f64>,

    /// What to do when motion between two frames cannot be estimated.
    #[arg(long, value_enum)]
    on_motion_failure: Option<FailureArg>,

    /// Output frame rate (defaults to the source rate).
    #[arg(long)]
    fps: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundaryArg {
    Reflect101,
    Replicate,
    Shrink,
}

impl BoundaryArg {
    fn to_core(self) -> BoundaryMode {
        match self {
            Self::Reflect101 => BoundaryMode::Reflect101,
            Self::Replicate => BoundaryMode::Replicate,
            Self::Shrink => BoundaryMode::Shrink,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HomographyArg {
    LeastSquares,
    Ransac,
}

impl HomographyArg {
    fn to_core(self) -> HomographyMethod {
        match self {
            Self::LeastSquares => HomographyMethod::LeastSquares,
            Self::Ransac => HomographyMethod::Ransac,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureArg {
    Identity,
    SkipFrame,
    Abort,
}

impl FailureArg {
    fn to_core(self) -> MotionFailurePolicy {
        match self {
            Self::Identity => MotionFailurePolicy::Identity,
            Self::SkipFrame => MotionFailurePolicy::SkipFrame,
            Self::Abort => MotionFailurePolicy::Abort,
        }
    }
}

impl CliTuningArgs {
    fn to_config(&self) -> CliResult<StabilizeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading config: {}", path.display());
                StabilizeConfig::from_json_file(path)?
            }
            None => StabilizeConfig::default(),
        };

        if let Some(window) = self.window {
            config.smoothing.window = window;
        }
        if self.sigma.is_some() {
            config.smoothing.sigma = self.sigma;
        }
        if let Some(boundary) = self.boundary {
            config.smoothing.boundary = boundary.to_core();
        }
        if let Some(max_corners) = self.max_corners {
            config.motion.features.max_corners = max_corners;
        }
        if let Some(quality_level) = self.quality_level {
            config.motion.features.quality_level = quality_level;
        }
        if let Some(min_distance) = self.min_distance {
            config.motion.features.min_distance = min_distance;
        }
        if let Some(method) = self.homography {
            config.motion.homography.method = method.to_core();
        }
        if let Some(thresh) = self.ransac_thresh_px {
            config.motion.homography.ransac.inlier_threshold = thresh;
        }
        if let Some(policy) = self.on_motion_failure {
            config.on_motion_failure = policy.to_core();
        }
        if self.fps.is_some() {
            config.fps = self.fps;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stabilize(args) => run_stabilize(&args),
        Commands::Trajectory(args) => run_trajectory(&args),
        Commands::Probe { input } => run_probe(&input),
    }
}

// ── I/O selection ──────────────────────────────────────────────────────

fn open_source(input: &Path) -> CliResult<Box<dyn FrameSource>> {
    if input.is_dir() {
        tracing::info!("Reading frames from directory: {}", input.display());
        Ok(Box::new(ImageSequenceSource::open(input)?))
    } else {
        tracing::info!("Decoding video: {}", input.display());
        Ok(Box::new(FfmpegSource::open(input)?))
    }
}

/// Directories, and paths without an extension, receive PNG frames.
fn writes_frames(output: &Path) -> bool {
    output.is_dir() || output.extension().is_none()
}

fn open_sink(output: &Path, codec: &str, geometry: &FrameGeometry) -> VideoResult<Box<dyn FrameSink>> {
    if writes_frames(output) {
        tracing::info!("Writing frames to directory: {}", output.display());
        Ok(Box::new(ImageSequenceSink::create(
            output,
            geometry.width,
            geometry.height,
        )?))
    } else {
        tracing::info!(
            "Encoding {}x{} @ {} fps to {}",
            geometry.width,
            geometry.height,
            geometry.fps,
            output.display()
        );
        Ok(Box::new(FfmpegSink::with_codec(output, *geometry, codec)?))
    }
}

// ── stabilize ──────────────────────────────────────────────────────────

fn run_stabilize(args: &CliStabilizeArgs) -> CliResult<()> {
    let mut config = args.tuning.to_config()?;
    config.keep_reference_frame |= args.keep_reference;

    let stabilizer = Stabilizer::new(config)?;
    let mut source = open_source(&args.input)?;
    let (_sink, report) = stabilizer.stabilize(&mut source, |geometry| {
        open_sink(&args.output, &args.codec, geometry)
    })?;

    tracing::info!(
        "Decoded {} frames, wrote {} to {}",
        report.trajectory.frames_decoded,
        report.frames_written,
        args.output.display()
    );
    let n_skipped = report.trajectory.skipped.len() + report.render_skipped.len();
    if n_skipped > 0 || !report.trajectory.fallbacks.is_empty() {
        tracing::info!(
            "{} frames skipped, {} transitions assumed static",
            n_skipped,
            report.trajectory.fallbacks.len()
        );
    }

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(report_path, json)?;
        tracing::info!("Report written to {}", report_path.display());
    }
    Ok(())
}

// ── trajectory ─────────────────────────────────────────────────────────

fn run_trajectory(args: &CliTrajectoryArgs) -> CliResult<()> {
    let config = args.tuning.to_config()?;
    let stabilizer = Stabilizer::new(config)?;
    let mut source = open_source(&args.input)?;
    let plan = stabilizer.plan(&mut source)?;

    let json = serde_json::to_string_pretty(&plan.trajectory_report())?;
    std::fs::write(&args.out, json)?;
    tracing::info!(
        "Trajectory of {} frames written to {}",
        plan.actual.len(),
        args.out.display()
    );
    Ok(())
}

// ── probe ──────────────────────────────────────────────────────────────

fn run_probe(input: &Path) -> CliResult<()> {
    let info = vstab::probe_video(input)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_stabilize_with_overrides() {
        let cli = Cli::try_parse_from([
            "vstab",
            "stabilize",
            "--input",
            "in.mp4",
            "--output",
            "out.mp4",
            "--window",
            "15",
            "--boundary",
            "shrink",
            "--on-motion-failure",
            "skip-frame",
            "--homography",
            "least-squares",
        ])
        .unwrap();
        let Commands::Stabilize(args) = cli.command else {
            panic!("expected stabilize");
        };
        let config = args.tuning.to_config().unwrap();
        assert_eq!(config.smoothing.window, 15);
        assert_eq!(config.smoothing.boundary, BoundaryMode::Shrink);
        assert_eq!(config.on_motion_failure, MotionFailurePolicy::SkipFrame);
        assert_eq!(config.motion.homography.method, HomographyMethod::LeastSquares);
        assert_eq!(args.codec, DEFAULT_CODEC);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::try_parse_from([
            "vstab", "trajectory", "--input", "frames", "--out", "t.json", "--window", "0",
        ])
        .unwrap();
        let Commands::Trajectory(args) = cli.command else {
            panic!("expected trajectory");
        };
        assert!(args.tuning.to_config().is_err());
    }

    #[test]
    fn output_kind_follows_extension() {
        assert!(writes_frames(Path::new("/tmp/definitely-missing-vstab-out")));
        assert!(!writes_frames(Path::new("stable.mp4")));
    }
}
