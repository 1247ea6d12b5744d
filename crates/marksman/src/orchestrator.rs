//! Per-target fallback chain: primary reference, alternate reference, then
//! linear scaling of the crop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use marksman_core::{FramePoint, ReferencePoint};
use marksman_detect::{Detection, HitInfo};
use marksman_features::{Registrar, Registration, RegistrationFailure};
use serde::{Deserialize, Serialize};

use crate::annotate::{
    draw_cross, draw_detections, ALTERNATE_COLOR, DETECTION_COLOR, FALLBACK_COLOR, MARKER_SIZE,
    MARKER_THICKNESS, MISS_COLOR, MISS_MARKER_SIZE, MISS_MARKER_THICKNESS, PRIMARY_COLOR,
};
use crate::assets::{ReferenceAsset, ReferenceView};

/// How the scored point was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Registered onto the canonical reference image.
    Primary,
    /// Registered onto the alternate reference image.
    Alternate,
    /// Both registrations failed; the crop point was scaled linearly onto
    /// the canonical image. Spatially much less accurate.
    LinearFallback,
    /// No target under the aim point.
    Miss,
}

impl Resolution {
    /// Marker colour that makes the resolution visible on the result image.
    pub fn marker_color(self) -> Rgb<u8> {
        match self {
            Self::Primary => PRIMARY_COLOR,
            Self::Alternate => ALTERNATE_COLOR,
            Self::LinearFallback => FALLBACK_COLOR,
            Self::Miss => MISS_COLOR,
        }
    }

    pub fn is_registered(self) -> bool {
        matches!(self, Self::Primary | Self::Alternate)
    }
}

/// Result of one shot.
#[derive(Clone, Debug)]
pub struct ScoreResult {
    /// Target profile name; `None` for a miss.
    pub target: Option<String>,
    pub score: u32,
    /// The reference image the point lives in (or the frame, for a miss)
    /// with a marker at the point.
    pub annotated: RgbImage,
    /// Scored point in the coordinates of `annotated`; `None` for a miss.
    pub coordinates: Option<ReferencePoint>,
    pub resolution: Resolution,
    /// Detector confidence of the hit target.
    pub confidence: Option<f32>,
    pub aim: FramePoint,
    /// Registration attempts that failed before the result was reached.
    pub failed_attempts: Vec<RegistrationFailure>,
    pub elapsed: Duration,
}

impl ScoreResult {
    pub fn is_hit(&self) -> bool {
        self.resolution != Resolution::Miss
    }
}

/// Scores hits on one target type.
#[derive(Clone, Debug)]
pub struct TargetScorer {
    asset: Arc<ReferenceAsset>,
    registrar: Registrar,
}

impl TargetScorer {
    pub fn new(asset: Arc<ReferenceAsset>, registrar: Registrar) -> Self {
        Self { asset, registrar }
    }

    pub fn asset(&self) -> &ReferenceAsset {
        &self.asset
    }

    /// Run the fallback chain for a hit on this target. Never fails: the
    /// linear fallback always produces a point.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(asset = self.asset.name())))]
    pub fn score_hit(&self, hit: &HitInfo) -> ScoreResult {
        let started = Instant::now();
        let crop = image::imageops::grayscale(&hit.crop);
        let primary = self.asset.primary();
        let mut failed = Vec::new();

        match self.registrar.register(primary.features(), &crop, hit.shot_point) {
            Registration::Aligned(a) => {
                return self.finish(hit, primary, a.point, Resolution::Primary, failed, started)
            }
            Registration::Failed(reason) => {
                log::info!("'{}': primary registration failed: {reason}", self.asset.name());
                failed.push(reason);
            }
        }

        if let Some(alternate) = self.asset.alternate() {
            match self.registrar.register(alternate.features(), &crop, hit.shot_point) {
                Registration::Aligned(a) => {
                    return self.finish(hit, alternate, a.point, Resolution::Alternate, failed, started)
                }
                Registration::Failed(reason) => {
                    log::info!("'{}': alternate registration failed: {reason}", self.asset.name());
                    failed.push(reason);
                }
            }
        }

        let (rw, rh) = primary.dimensions();
        let (cw, ch) = hit.crop.dimensions();
        let point = hit
            .shot_point
            .scaled_to_reference(rw as f32 / cw as f32, rh as f32 / ch as f32);
        log::warn!(
            "'{}': scoring unregistered shot by linear scaling at {point:?}",
            self.asset.name()
        );
        self.finish(hit, primary, point, Resolution::LinearFallback, failed, started)
    }

    fn finish(
        &self,
        hit: &HitInfo,
        view: &ReferenceView,
        point: ReferencePoint,
        resolution: Resolution,
        failed_attempts: Vec<RegistrationFailure>,
        started: Instant,
    ) -> ScoreResult {
        let score = view.template().score(Some(point));
        let mut annotated = view.image().clone();
        draw_cross(
            &mut annotated,
            (point.x, point.y),
            resolution.marker_color(),
            MARKER_SIZE,
            MARKER_THICKNESS,
        );
        log::info!(
            "'{}' scored {score} ({resolution:?}) at {point:?}",
            self.asset.name()
        );
        ScoreResult {
            target: Some(self.asset.name().to_string()),
            score,
            annotated,
            coordinates: Some(point),
            resolution,
            confidence: Some(hit.confidence),
            aim: hit.aim,
            failed_attempts,
            elapsed: started.elapsed(),
        }
    }
}

/// Result for a shot that hit no target: score 0, the frame annotated at
/// the aim point with the candidate detections outlined.
pub fn miss_result(frame: &RgbImage, aim: FramePoint, detections: &[Detection]) -> ScoreResult {
    let mut annotated = frame.clone();
    draw_detections(&mut annotated, detections, DETECTION_COLOR);
    draw_cross(
        &mut annotated,
        (aim.x, aim.y),
        MISS_COLOR,
        MISS_MARKER_SIZE,
        MISS_MARKER_THICKNESS,
    );
    ScoreResult {
        target: None,
        score: 0,
        annotated,
        coordinates: None,
        resolution: Resolution::Miss,
        confidence: None,
        aim,
        failed_attempts: Vec::new(),
        elapsed: Duration::ZERO,
    }
}
