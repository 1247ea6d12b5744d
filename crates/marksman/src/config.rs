//! JSON configuration of a trainer station.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use marksman_features::RegistrationParams;
use marksman_zones::{preset, ZoneError, ZoneTable, PRESET_NAMES};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("target '{target}': {source}")]
    Zones {
        target: String,
        #[source]
        source: ZoneError,
    },
    #[error("target '{0}' is configured twice")]
    DuplicateTarget(String),
    #[error("label '{0}' is mapped to more than one target")]
    DuplicateLabel(String),
    #[error("target '{0}' has no detector labels")]
    NoLabels(String),
    #[error("bounded queue needs a capacity of at least 1")]
    ZeroCapacity,
}

/// One scoreable target type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Asset key: `original/<name>.png`, `mask/mask_<name>.png`.
    pub name: String,
    /// Detector class labels that mean this target.
    pub labels: Vec<String>,
    /// Zones in pixels of the canonical reference image.
    pub zones: ZoneTable,
    /// Overrides `RegistrationParams::min_inliers` for this target.
    #[serde(default)]
    pub min_inliers: Option<usize>,
}

impl TargetProfile {
    /// Stock profile by name, with its built-in zone table.
    pub fn stock(name: &str) -> Option<Self> {
        let label = match name {
            "bia_so_7" => "bia_so_7_8",
            other => other,
        };
        Some(Self {
            name: name.to_string(),
            labels: vec![label.to_string()],
            zones: preset(name)?,
            min_inliers: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detections below this confidence are ignored.
    pub confidence_threshold: f32,
    /// Upper bound on one inference; 0 disables the bound.
    pub timeout_ms: u64,
    /// ONNX model used by the `onnx` backend.
    pub model_path: Option<PathBuf>,
    /// Class names in model output order.
    pub class_names: Vec<String>,
    pub input_size: u32,
    pub iou_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.1,
            timeout_ms: 2000,
            model_path: None,
            class_names: vec![
                "bia_so_4".to_string(),
                "bia_so_7_8".to_string(),
                "bia_so_8".to_string(),
            ],
            input_size: 640,
            iou_threshold: 0.45,
        }
    }
}

impl DetectionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// What to do with shots that arrive while one is being scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Queue up to `capacity` pending shots; reject further submissions.
    Bounded { capacity: usize },
    /// Keep only the newest pending shot; older pending shots are superseded.
    LatestOnly,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self::Bounded { capacity: 8 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Directory holding `original/` and `mask/`.
    pub asset_root: PathBuf,
    pub detection: DetectionConfig,
    pub registration: RegistrationParams,
    pub queue: QueuePolicy,
    pub targets: Vec<TargetProfile>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("images"),
            detection: DetectionConfig::default(),
            registration: RegistrationParams::default(),
            queue: QueuePolicy::default(),
            targets: PRESET_NAMES
                .iter()
                .filter_map(|name| TargetProfile::stock(name))
                .collect(),
        }
    }
}

impl TrainerConfig {
    /// Load and validate a JSON config.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue == (QueuePolicy::Bounded { capacity: 0 }) {
            return Err(ConfigError::ZeroCapacity);
        }
        let mut names = HashSet::new();
        let mut labels = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.clone()));
            }
            if target.labels.is_empty() {
                return Err(ConfigError::NoLabels(target.name.clone()));
            }
            for label in &target.labels {
                if !labels.insert(label.as_str()) {
                    return Err(ConfigError::DuplicateLabel(label.clone()));
                }
            }
            target
                .zones
                .validate()
                .map_err(|source| ConfigError::Zones {
                    target: target.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}
