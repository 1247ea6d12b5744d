//! Target detection and hit resolution.
//!
//! - [`Detector`] is the seam to an object-detection model. Implementations
//!   must fail loudly ([`DetectError`]) instead of returning an empty list
//!   when the model is broken: "nothing there" and "cannot tell" are
//!   different answers.
//! - [`DeadlineDetector`] bounds inference latency.
//! - [`resolve_hit`] decides which detected target (if any) lies under the
//!   aim point and cuts its crop out of the frame.
//! - With the `onnx` feature, `OnnxYoloDetector` runs a YOLOv8 export through
//!   ONNX Runtime.

mod deadline;
mod detection;
mod detector;
mod hit;
#[cfg(feature = "onnx")]
mod onnx;
mod yolo;

pub use deadline::DeadlineDetector;
pub use detection::{BoundingBox, Detection, PixelRect};
pub use detector::{
    DetectError, Detector, ReplayDetector, UnavailableDetector, WARM_UP_HEIGHT, WARM_UP_WIDTH,
};
pub use hit::{resolve_hit, select_hit, HitInfo, HitOutcome};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxYoloDetector, OnnxYoloParams};
pub use yolo::{decode_yolo_output, letterbox, nms, to_planar, Letterbox};
