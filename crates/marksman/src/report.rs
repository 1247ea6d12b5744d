use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::{Resolution, ScoreResult};

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Persistable summary of a [`ScoreResult`] (everything but the image).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShotReport {
    pub target: Option<String>,
    pub score: u32,
    pub coordinates: Option<[f32; 2]>,
    pub resolution: Resolution,
    pub confidence: Option<f32>,
    pub aim: [f32; 2],
    /// Reasons of the registration attempts that failed.
    #[serde(default)]
    pub failed_attempts: Vec<String>,
    pub elapsed_ms: f64,
    /// Where the annotated image was saved, if it was.
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    /// When the report was made, RFC 3339 in JSON.
    pub timestamp: DateTime<Utc>,
}

impl ShotReport {
    pub fn from_result(result: &ScoreResult, image_path: Option<&Path>) -> Self {
        Self {
            target: result.target.clone(),
            score: result.score,
            coordinates: result.coordinates.map(|p| [p.x, p.y]),
            resolution: result.resolution,
            confidence: result.confidence,
            aim: [result.aim.x, result.aim.y],
            failed_attempts: result
                .failed_attempts
                .iter()
                .map(ToString::to_string)
                .collect(),
            elapsed_ms: result.elapsed.as_secs_f64() * 1000.0,
            image_path: image_path.map(Path::to_path_buf),
            timestamp: Utc::now(),
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

impl ScoreResult {
    /// Save the annotated image to `path` (format from the extension).
    pub fn save_annotated(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        self.annotated.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::miss_result;
    use image::RgbImage;
    use marksman_core::FramePoint;

    #[test]
    fn miss_report_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = miss_result(&RgbImage::new(40, 30), FramePoint::new(20.0, 15.0), &[]);
        let before = Utc::now();
        let img = dir.path().join("shot.png");
        result.save_annotated(&img).expect("save image");
        let report = ShotReport::from_result(&result, Some(&img));
        assert_eq!(report.score, 0);
        assert_eq!(report.coordinates, None);
        assert_eq!(report.resolution, Resolution::Miss);
        assert!(report.timestamp >= before && report.timestamp <= Utc::now());

        let json = dir.path().join("shot.json");
        report.write_json(&json).expect("write");
        assert_eq!(ShotReport::load_json(&json).expect("load"), report);
        let raw = std::fs::read_to_string(&json).expect("read");
        assert!(raw.contains(r#""resolution": "miss""#));
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        let stamp = value["timestamp"].as_str().expect("timestamp string");
        let parsed = DateTime::parse_from_rfc3339(stamp).expect("rfc 3339");
        assert_eq!(parsed.with_timezone(&Utc), report.timestamp);
    }
}
