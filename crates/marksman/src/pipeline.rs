//! Shot pipeline: detection, hit resolution and per-target scoring.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use marksman_core::FramePoint;
use marksman_detect::{resolve_hit, DeadlineDetector, DetectError, Detection, Detector, HitOutcome};
use marksman_features::Registrar;

use crate::assets::{AssetLayout, ReferenceAsset};
use crate::orchestrator::{miss_result, ScoreResult, TargetScorer};
use crate::{DetectionConfig, QueuePolicy, TargetProfile, TrainerConfig};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShotError {
    #[error(transparent)]
    Detection(#[from] DetectError),
    #[error("target '{target}' cannot be scored: {reason}")]
    TargetUnavailable { target: String, reason: String },
    #[error("target hint '{0}' matches no configured target")]
    UnknownTarget(String),
    #[error("empty frame")]
    EmptyFrame,
    #[error("superseded by a newer shot")]
    Superseded,
}

/// One fired shot.
#[derive(Clone, Debug)]
pub struct ShotRequest {
    pub frame: RgbImage,
    /// Aim point in frame pixels; the frame centre when `None`.
    pub aim: Option<FramePoint>,
    /// Restrict scoring to one target profile.
    pub target_hint: Option<String>,
}

impl ShotRequest {
    pub fn new(frame: RgbImage) -> Self {
        Self {
            frame,
            aim: None,
            target_hint: None,
        }
    }

    pub fn with_aim(mut self, aim: FramePoint) -> Self {
        self.aim = Some(aim);
        self
    }

    pub fn with_target_hint(mut self, target: impl Into<String>) -> Self {
        self.target_hint = Some(target.into());
        self
    }

    pub fn resolved_aim(&self) -> FramePoint {
        self.aim.unwrap_or_else(|| {
            FramePoint::new(
                (self.frame.width() / 2) as f32,
                (self.frame.height() / 2) as f32,
            )
        })
    }
}

enum TargetState {
    Ready(TargetScorer),
    Unavailable(String),
}

struct TargetSlot {
    profile: TargetProfile,
    state: TargetState,
}

/// Detector, reference assets and settings shared by every shot.
/// Immutable once built.
pub struct PipelineContext {
    detector: Arc<dyn Detector>,
    detection: DetectionConfig,
    queue: QueuePolicy,
    targets: Vec<TargetSlot>,
}

impl PipelineContext {
    /// Load every target of `config` from its asset root.
    ///
    /// A target whose assets fail to load stays configured but unavailable;
    /// shots on it fail with [`ShotError::TargetUnavailable`].
    pub fn load(config: &TrainerConfig, detector: Arc<dyn Detector>) -> Self {
        let layout = AssetLayout::new(&config.asset_root);
        let targets = config
            .targets
            .iter()
            .map(|profile| {
                let registrar = registrar_for(config, profile);
                let state = match ReferenceAsset::load(&layout, profile, &registrar) {
                    Ok(asset) => TargetState::Ready(TargetScorer::new(Arc::new(asset), registrar)),
                    Err(e) => {
                        log::error!("target '{}' unavailable: {e}", profile.name);
                        TargetState::Unavailable(e.to_string())
                    }
                };
                TargetSlot {
                    profile: profile.clone(),
                    state,
                }
            })
            .collect();
        Self::with_slots(detector, config, targets)
    }

    /// Build from assets already in memory. Every profile must have a
    /// matching asset (by name); profiles without one are unavailable.
    pub fn from_assets(
        config: &TrainerConfig,
        detector: Arc<dyn Detector>,
        assets: Vec<ReferenceAsset>,
    ) -> Self {
        let mut assets: Vec<Option<ReferenceAsset>> = assets.into_iter().map(Some).collect();
        let targets = config
            .targets
            .iter()
            .map(|profile| {
                let asset = assets
                    .iter_mut()
                    .find(|a| a.as_ref().is_some_and(|a| a.name() == profile.name))
                    .and_then(Option::take);
                let state = match asset {
                    Some(asset) => TargetState::Ready(TargetScorer::new(
                        Arc::new(asset),
                        registrar_for(config, profile),
                    )),
                    None => TargetState::Unavailable("no reference asset".to_string()),
                };
                TargetSlot {
                    profile: profile.clone(),
                    state,
                }
            })
            .collect();
        Self::with_slots(detector, config, targets)
    }

    fn with_slots(
        detector: Arc<dyn Detector>,
        config: &TrainerConfig,
        targets: Vec<TargetSlot>,
    ) -> Self {
        let detection = config.detection.clone();
        let detector: Arc<dyn Detector> = match detection.timeout() {
            Some(timeout) => Arc::new(DeadlineDetector::new(detector, timeout)),
            None => detector,
        };
        Self {
            detector,
            detection,
            queue: config.queue,
            targets,
        }
    }

    /// Queue policy for a [`crate::ShotWorker`] fed by this context.
    pub fn queue_policy(&self) -> QueuePolicy {
        self.queue
    }

    pub fn detector(&self) -> &dyn Detector {
        self.detector.as_ref()
    }

    /// Names of targets whose assets loaded.
    pub fn ready_targets(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| matches!(t.state, TargetState::Ready(_)))
            .map(|t| t.profile.name.as_str())
            .collect()
    }

    fn slot_for_label(&self, label: &str) -> Option<&TargetSlot> {
        self.targets
            .iter()
            .find(|t| t.profile.labels.iter().any(|l| l == label))
    }
}

fn registrar_for(config: &TrainerConfig, profile: &TargetProfile) -> Registrar {
    let mut params = config.registration.clone();
    if let Some(min_inliers) = profile.min_inliers {
        params.min_inliers = min_inliers;
    }
    Registrar::new(params)
}

/// Scores shots against a shared [`PipelineContext`].
#[derive(Clone)]
pub struct ShotPipeline {
    context: Arc<PipelineContext>,
}

impl ShotPipeline {
    /// Warm the detector up and return a pipeline ready for live shots.
    /// Fails when the detector cannot run at all.
    pub fn new(context: Arc<PipelineContext>) -> Result<Self, ShotError> {
        let started = Instant::now();
        context.detector.warm_up()?;
        log::info!(
            "{} warmed up in {:.2?}; targets ready: {:?}",
            context.detector.name(),
            started.elapsed(),
            context.ready_targets()
        );
        Ok(Self { context })
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Score one shot.
    ///
    /// Detector failures and unavailable targets are errors; a shot that hits
    /// nothing is a complete [`ScoreResult`] with score 0.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "info",
            skip_all,
            fields(w = request.frame.width(), h = request.frame.height())
        )
    )]
    pub fn process_shot(&self, request: &ShotRequest) -> Result<ScoreResult, ShotError> {
        let started = Instant::now();
        let frame = &request.frame;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ShotError::EmptyFrame);
        }
        let ctx = &self.context;
        if let Some(hint) = &request.target_hint {
            if !ctx.targets.iter().any(|t| &t.profile.name == hint) {
                return Err(ShotError::UnknownTarget(hint.clone()));
            }
        }

        let aim = request.resolved_aim();
        let detections = ctx
            .detector
            .detect(frame, ctx.detection.confidence_threshold)?;
        let candidates: Vec<Detection> = detections
            .into_iter()
            .filter(|d| {
                ctx.slot_for_label(&d.label).is_some_and(|slot| {
                    request
                        .target_hint
                        .as_ref()
                        .is_none_or(|hint| &slot.profile.name == hint)
                })
            })
            .collect();
        log::debug!("{} candidate detections, aim {aim:?}", candidates.len());

        let mut result = match resolve_hit(&candidates, aim, frame) {
            HitOutcome::Miss { aim } => {
                log::info!("miss at {aim:?}");
                miss_result(frame, aim, &candidates)
            }
            HitOutcome::Hit(hit) => {
                let Some(slot) = ctx.slot_for_label(&hit.label) else {
                    return Err(ShotError::UnknownTarget(hit.label));
                };
                match &slot.state {
                    TargetState::Ready(scorer) => scorer.score_hit(&hit),
                    TargetState::Unavailable(reason) => {
                        return Err(ShotError::TargetUnavailable {
                            target: slot.profile.name.clone(),
                            reason: reason.clone(),
                        })
                    }
                }
            }
        };
        result.elapsed = started.elapsed();
        Ok(result)
    }
}
