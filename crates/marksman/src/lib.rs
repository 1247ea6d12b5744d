//! Shot scoring for camera-based marksmanship trainers.
//!
//! A shot is a camera frame plus an aim point. The pipeline
//! 1. detects paper targets in the frame ([`detect`]),
//! 2. finds the target under the aim point and crops it,
//! 3. registers the crop onto the target's canonical reference image
//!    ([`features`]), falling back to an alternate reference and finally to
//!    linear scaling,
//! 4. looks the registered point up in the target's scoring zones
//!    ([`zones`]).
//!
//! The result carries the score, the reference-space point, how it was
//! resolved and an annotated image whose marker colour shows the
//! resolution: red for the primary reference, orange for the alternate,
//! yellow for the linear fallback.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use marksman::{PipelineContext, ShotPipeline, ShotRequest, TrainerConfig};
//! use marksman::detect::ReplayDetector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrainerConfig::load_json("trainer.json")?;
//! let detections = serde_json::from_str(&std::fs::read_to_string("detections.json")?)?;
//! let detector = Arc::new(ReplayDetector::new(detections));
//!
//! let context = Arc::new(PipelineContext::load(&config, detector));
//! let pipeline = ShotPipeline::new(context)?;
//!
//! let frame = image::open("frame.png")?.to_rgb8();
//! let result = pipeline.process_shot(&ShotRequest::new(frame))?;
//! println!("{:?} scored {}", result.target, result.score);
//! # Ok(())
//! # }
//! ```
//!
//! For live use, hand the pipeline to a [`ShotWorker`] (`ShotWorker::start`
//! applies the configured queue policy) and submit shots
//! from the capture loop.

pub use marksman_core as core;
pub use marksman_detect as detect;
pub use marksman_features as features;
pub use marksman_zones as zones;

pub mod annotate;
mod assets;
mod config;
mod orchestrator;
mod pipeline;
mod report;
mod worker;

pub use assets::{AssetError, AssetLayout, ReferenceAsset, ReferenceView};
pub use config::{ConfigError, DetectionConfig, QueuePolicy, TargetProfile, TrainerConfig};
pub use orchestrator::{miss_result, Resolution, ScoreResult, TargetScorer};
pub use pipeline::{PipelineContext, ShotError, ShotPipeline, ShotRequest};
pub use report::{ReportError, ShotReport};
pub use worker::{ShotEvent, ShotWorker, SubmitError};
