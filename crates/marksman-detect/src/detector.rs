use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::RgbImage;

use crate::Detection;

/// Size of the blank frame used by [`Detector::warm_up`].
pub const WARM_UP_WIDTH: u32 = 640;
pub const WARM_UP_HEIGHT: u32 = 480;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("detection model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("inference did not finish within {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("previous inference is still running")]
    Busy,
    #[error("invalid input image {width}x{height}")]
    InvalidInput { width: u32, height: u32 },
}

/// Object detector over whole camera frames.
///
/// `detect` returns every detection at or above `confidence_threshold`,
/// boxes in frame pixels. An empty vector means nothing was found; a broken
/// or missing model is an error.
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectError>;

    /// Run one throwaway inference so lazy model initialisation happens
    /// before the first real frame.
    fn warm_up(&self) -> Result<(), DetectError> {
        let blank = RgbImage::new(WARM_UP_WIDTH, WARM_UP_HEIGHT);
        self.detect(&blank, 0.5).map(|_| ())
    }

    fn name(&self) -> &str {
        "detector"
    }
}

/// Returns a fixed detection list for every frame.
///
/// Used to score frames against detections produced elsewhere (a JSON file
/// next to the frame) and as a deterministic detector in tests.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    detections: Vec<Detection>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ReplayDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` on every call, simulating a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `detect` calls so far, warm-up included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ReplayDetector {
    fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectError::InvalidInput {
                width: image.width(),
                height: image.height(),
            });
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Stands in for a model that failed to load. Every call errors.
#[derive(Clone, Debug)]
pub struct UnavailableDetector {
    reason: String,
}

impl UnavailableDetector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Detector for UnavailableDetector {
    fn detect(&self, _image: &RgbImage, _threshold: f32) -> Result<Vec<Detection>, DetectError> {
        Err(DetectError::ModelUnavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
