//! marksman CLI: write a default config, score a single frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use marksman::core::FramePoint;
use marksman::detect::{Detection, Detector, ReplayDetector};
use marksman::{PipelineContext, ShotPipeline, ShotReport, ShotRequest, TrainerConfig};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "marksman")]
#[command(about = "Score shots on paper targets from camera frames")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit structured JSON logs.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default trainer configuration.
    InitConfig {
        /// Destination JSON file.
        path: PathBuf,
    },
    /// Score one frame.
    Score {
        /// Trainer configuration (JSON).
        #[arg(long)]
        config: PathBuf,

        /// Camera frame.
        #[arg(long)]
        frame: PathBuf,

        /// Detections for the frame (JSON array), replayed instead of
        /// running a model.
        #[arg(long)]
        detections: Option<PathBuf>,

        /// YOLO ONNX model; overrides `detection.model_path`.
        #[cfg(feature = "onnx")]
        #[arg(long)]
        model: Option<PathBuf>,

        /// Aim point as `X,Y` in frame pixels (default: frame centre).
        #[arg(long, value_parser = parse_point)]
        aim: Option<FramePoint>,

        /// Only score this target profile.
        #[arg(long)]
        target: Option<String>,

        /// Where to save the annotated image.
        #[arg(long)]
        annotated: Option<PathBuf>,

        /// Where to write the shot report (JSON). Printed to stdout otherwise.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn parse_point(s: &str) -> Result<FramePoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f32>()
            .map_err(|e| format!("bad coordinate '{v}': {e}"))
    };
    Ok(FramePoint::new(parse(x)?, parse(y)?))
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    init_logging(&cli, level)?;

    match cli.command {
        Commands::InitConfig { path } => {
            TrainerConfig::default().write_json(&path)?;
            log::info!("wrote default config to {}", path.display());
            Ok(())
        }
        Commands::Score {
            config,
            frame,
            detections,
            #[cfg(feature = "onnx")]
            model,
            aim,
            target,
            annotated,
            report,
        } => {
            let cfg = TrainerConfig::load_json(&config)?;
            #[cfg(feature = "onnx")]
            let detector = build_detector(&cfg, detections.as_deref(), model.as_deref())?;
            #[cfg(not(feature = "onnx"))]
            let detector = build_detector(&cfg, detections.as_deref())?;
            run_score(&cfg, detector, &frame, aim, target, annotated.as_deref(), report.as_deref())
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli, level: LevelFilter) -> CliResult<()> {
    if cli.json_log {
        let _ = tracing_log::LogTracer::init();
        marksman::core::init_tracing(true);
        return Ok(());
    }
    Ok(marksman::core::init_with_level(level)?)
}

#[cfg(not(feature = "tracing"))]
fn init_logging(_cli: &Cli, level: LevelFilter) -> CliResult<()> {
    Ok(marksman::core::init_with_level(level)?)
}

#[cfg(not(feature = "onnx"))]
fn build_detector(_cfg: &TrainerConfig, detections: Option<&Path>) -> CliResult<Arc<dyn Detector>> {
    let path = detections.ok_or("--detections is required (build with feature `onnx` to run a model)")?;
    load_replay(path)
}

#[cfg(feature = "onnx")]
fn build_detector(
    cfg: &TrainerConfig,
    detections: Option<&Path>,
    model: Option<&Path>,
) -> CliResult<Arc<dyn Detector>> {
    use marksman::detect::{OnnxYoloDetector, OnnxYoloParams};

    if let Some(path) = detections {
        return load_replay(path);
    }
    let model = model
        .or(cfg.detection.model_path.as_deref())
        .ok_or("pass --detections or --model, or set detection.model_path")?;
    let params = OnnxYoloParams {
        input_size: cfg.detection.input_size,
        iou_threshold: cfg.detection.iou_threshold,
        class_names: cfg.detection.class_names.clone(),
    };
    Ok(Arc::new(OnnxYoloDetector::load(model, params)?))
}

fn load_replay(path: &Path) -> CliResult<Arc<dyn Detector>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("cannot read {}: {e}", path.display()).into() })?;
    let detections: Vec<Detection> = serde_json::from_str(&raw)?;
    log::debug!("replaying {} detections from {}", detections.len(), path.display());
    Ok(Arc::new(ReplayDetector::new(detections)))
}

fn run_score(
    cfg: &TrainerConfig,
    detector: Arc<dyn Detector>,
    frame_path: &Path,
    aim: Option<FramePoint>,
    target: Option<String>,
    annotated_path: Option<&Path>,
    report_path: Option<&Path>,
) -> CliResult<()> {
    let frame = image::open(frame_path)
        .map_err(|e| -> CliError { format!("cannot open {}: {e}", frame_path.display()).into() })?
        .to_rgb8();

    let context = Arc::new(PipelineContext::load(cfg, detector));
    let pipeline = ShotPipeline::new(context)?;
    let request = ShotRequest {
        frame,
        aim,
        target_hint: target,
    };
    let result = pipeline.process_shot(&request)?;

    if let Some(path) = annotated_path {
        result.save_annotated(path)?;
        log::info!("annotated image written to {}", path.display());
    }
    let report = ShotReport::from_result(&result, annotated_path);
    match report_path {
        Some(path) => {
            report.write_json(path)?;
            log::info!("report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
