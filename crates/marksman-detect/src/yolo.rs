//! YOLOv8 pre- and post-processing, independent of the inference runtime.

use image::{imageops::FilterType, Rgb, RgbImage};

use crate::{BoundingBox, Detection};

const PAD_GRAY: u8 = 114;

/// Geometry of a letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Map a box from model-input pixels back to a `width x height` frame.
    pub fn unmap(&self, b: BoundingBox, width: u32, height: u32) -> BoundingBox {
        let fx = |v: f32| ((v - self.pad_x as f32) / self.scale).clamp(0.0, width as f32);
        let fy = |v: f32| ((v - self.pad_y as f32) / self.scale).clamp(0.0, height as f32);
        BoundingBox::new(fx(b.x1), fy(b.y1), fx(b.x2), fy(b.y2))
    }
}

/// Resize `image` to fit a `size x size` square keeping its aspect ratio,
/// centred on a gray canvas.
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
    let (w, h) = image.dimensions();
    let scale = (size as f32 / w.max(1) as f32).min(size as f32 / h.max(1) as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_GRAY; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);
    (
        canvas,
        Letterbox {
            size,
            scale,
            pad_x,
            pad_y,
        },
    )
}

/// Planar RGB in `[0, 1]`, laid out as `[3, h, w]`.
pub fn to_planar(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let mut out = vec![0.0_f32; 3 * plane];
    for (i, px) in image.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = px.0[c] as f32 / 255.0;
        }
    }
    out
}

/// Decode a `[1, 4 + C, N]` YOLOv8 output tensor (row-major, batch
/// dimension dropped) into frame-space detections at or above `threshold`.
pub fn decode_yolo_output(
    output: &[f32],
    num_boxes: usize,
    class_names: &[String],
    threshold: f32,
    letterbox: &Letterbox,
    frame: (u32, u32),
) -> Vec<Detection> {
    if num_boxes == 0 || output.len() % num_boxes != 0 {
        log::warn!(
            "output of {} values is not a multiple of {num_boxes} boxes",
            output.len()
        );
        return Vec::new();
    }
    let attrs = output.len() / num_boxes;
    if attrs <= 4 {
        return Vec::new();
    }
    let at = |attr: usize, i: usize| output[attr * num_boxes + i];

    let mut out = Vec::new();
    for i in 0..num_boxes {
        let (class, score) = (4..attrs)
            .map(|a| (a - 4, at(a, i)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, f32::NEG_INFINITY));
        if score.is_nan() || score < threshold {
            continue;
        }
        let (cx, cy, bw, bh) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let model_box = BoundingBox::new(cx - bw / 2.0, cy - bh / 2.0, cx + bw / 2.0, cy + bh / 2.0);
        let label = class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{class}"));
        out.push(Detection::new(
            label,
            score,
            letterbox.unmap(model_box, frame.0, frame.1),
        ));
    }
    out
}

/// Greedy per-label non-maximum suppression.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.label.cmp(&b.label))
    });
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for d in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.label == d.label && k.bbox.iou(&d.bbox) > iou_threshold);
        if !suppressed {
            kept.push(d);
        }
    }
    kept
}
