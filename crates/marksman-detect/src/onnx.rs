use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ndarray::Array4;
use ort::{session::Session, value::Value};
use serde::{Deserialize, Serialize};

use crate::yolo::{decode_yolo_output, letterbox, nms, to_planar};
use crate::{DetectError, Detection, Detector};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxYoloParams {
    /// Side of the square model input.
    pub input_size: u32,
    pub iou_threshold: f32,
    /// Class names in model output order.
    pub class_names: Vec<String>,
}

impl Default for OnnxYoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.45,
            class_names: Vec::new(),
        }
    }
}

/// YOLOv8 detector exported to ONNX.
pub struct OnnxYoloDetector {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    params: OnnxYoloParams,
}

impl OnnxYoloDetector {
    pub fn load(path: impl AsRef<Path>, params: OnnxYoloParams) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            DetectError::ModelUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let session = Session::builder()
            .and_then(|b| b.commit_from_memory(&bytes))
            .map_err(|e| {
                DetectError::ModelUnavailable(format!("cannot load {}: {e}", path.display()))
            })?;
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| DetectError::ModelUnavailable("model has no inputs".into()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| DetectError::ModelUnavailable("model has no outputs".into()))?;
        log::info!(
            "loaded detection model {} ({} classes)",
            path.display(),
            params.class_names.len()
        );
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            params,
        })
    }
}

impl Detector for OnnxYoloDetector {
    fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(DetectError::InvalidInput {
                width: w,
                height: h,
            });
        }
        let size = self.params.input_size;
        let (input, lb) = letterbox(image, size);
        let tensor = Array4::from_shape_vec((1, 3, size as usize, size as usize), to_planar(&input))
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let value = Value::from_array(tensor).map_err(|e| DetectError::Inference(e.to_string()))?;

        let (data, num_boxes) = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| DetectError::Inference("session lock poisoned".into()))?;
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => &value])
                .map_err(|e| DetectError::Inference(e.to_string()))?;
            let view = outputs[self.output_name.as_str()]
                .try_extract_array::<f32>()
                .map_err(|e| DetectError::Inference(e.to_string()))?;
            let shape = view.shape().to_vec();
            if shape.len() != 3 || shape[0] != 1 {
                return Err(DetectError::Inference(format!(
                    "unexpected output shape {shape:?}"
                )));
            }
            (view.iter().copied().collect::<Vec<f32>>(), shape[2])
        };

        let raw = decode_yolo_output(
            &data,
            num_boxes,
            &self.params.class_names,
            confidence_threshold,
            &lb,
            (w, h),
        );
        let kept = nms(raw, self.params.iou_threshold);
        log::debug!("{} detections after nms", kept.len());
        Ok(kept)
    }

    fn name(&self) -> &str {
        "onnx-yolo"
    }
}
