use std::cmp::Ordering;

use image::RgbImage;
use marksman_core::{CropPoint, FramePoint};

use crate::{BoundingBox, Detection, PixelRect};

/// The target under the aim point, cut out of the frame.
#[derive(Clone, Debug)]
pub struct HitInfo {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Frame rectangle the crop was taken from.
    pub crop_rect: PixelRect,
    pub crop: RgbImage,
    /// The aim point relative to the crop's top-left corner.
    pub shot_point: CropPoint,
    pub aim: FramePoint,
}

#[derive(Clone, Debug)]
pub enum HitOutcome {
    Hit(HitInfo),
    Miss { aim: FramePoint },
}

impl HitOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn aim(&self) -> FramePoint {
        match self {
            Self::Hit(info) => info.aim,
            Self::Miss { aim } => *aim,
        }
    }
}

/// Pick the detection whose box contains `aim`.
///
/// Highest confidence wins; equal confidences go to the lexically smaller
/// label, then to the earlier detection. Detections with a non-finite
/// confidence never win.
pub fn select_hit(detections: &[Detection], aim: FramePoint) -> Option<&Detection> {
    detections
        .iter()
        .filter(|d| d.confidence.is_finite() && d.bbox.contains(aim))
        .fold(None, |best: Option<&Detection>, candidate| match best {
            Some(incumbent) if !outranks(candidate, incumbent) => Some(incumbent),
            _ => Some(candidate),
        })
}

fn outranks(candidate: &Detection, incumbent: &Detection) -> bool {
    match candidate.confidence.total_cmp(&incumbent.confidence) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.label < incumbent.label,
    }
}

/// Resolve the aim point against the detections of `frame`.
///
/// A containing detection whose box has no pixels inside the frame is a
/// miss.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(n = detections.len())))]
pub fn resolve_hit(detections: &[Detection], aim: FramePoint, frame: &RgbImage) -> HitOutcome {
    let Some(best) = select_hit(detections, aim) else {
        return HitOutcome::Miss { aim };
    };
    let Some(rect) = best.bbox.pixel_rect(frame.width(), frame.height()) else {
        log::debug!("hit box for '{}' lies outside the frame", best.label);
        return HitOutcome::Miss { aim };
    };
    let crop = image::imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image();
    HitOutcome::Hit(HitInfo {
        label: best.label.clone(),
        confidence: best.confidence,
        bbox: best.bbox,
        crop_rect: rect,
        crop,
        shot_point: aim.relative_to(rect.origin()),
        aim,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32, b: [f32; 4]) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(b[0], b[1], b[2], b[3]))
    }

    #[test]
    fn highest_confidence_container_wins() {
        let dets = vec![
            det("bia_so_4", 0.6, [0.0, 0.0, 100.0, 100.0]),
            det("bia_so_7", 0.9, [50.0, 50.0, 150.0, 150.0]),
            det("bia_so_8", 0.99, [200.0, 200.0, 300.0, 300.0]),
        ];
        let aim = FramePoint::new(75.0, 75.0);
        assert_eq!(select_hit(&dets, aim).map(|d| d.label.as_str()), Some("bia_so_7"));
    }

    #[test]
    fn ties_break_on_label_then_order() {
        let b = [0.0, 0.0, 10.0, 10.0];
        let dets = vec![det("bia_so_8", 0.5, b), det("bia_so_4", 0.5, b)];
        let aim = FramePoint::new(5.0, 5.0);
        assert_eq!(select_hit(&dets, aim).map(|d| d.label.as_str()), Some("bia_so_4"));

        let dets = vec![det("bia_so_4", 0.5, b), det("bia_so_4", 0.5, [1.0, 1.0, 9.0, 9.0])];
        let chosen = select_hit(&dets, aim).expect("hit");
        assert_eq!(chosen.bbox, dets[0].bbox);
    }

    #[test]
    fn hit_iff_some_box_contains_aim() {
        let dets = vec![
            det("a", 0.3, [10.0, 10.0, 20.0, 20.0]),
            det("b", 0.4, [30.0, 5.0, 40.0, 25.0]),
        ];
        let frame = RgbImage::new(64, 32);
        for y in 0..32 {
            for x in 0..64 {
                let aim = FramePoint::new(x as f32, y as f32);
                let expected = dets.iter().any(|d| d.bbox.contains(aim));
                assert_eq!(resolve_hit(&dets, aim, &frame).is_hit(), expected, "{x},{y}");
            }
        }
    }

    #[test]
    fn shot_point_plus_origin_is_aim() {
        let dets = vec![det("bia_so_4", 0.8, [37.6, 12.2, 90.1, 70.9])];
        let frame = RgbImage::new(120, 80);
        let aim = FramePoint::new(63.25, 40.5);
        let HitOutcome::Hit(info) = resolve_hit(&dets, aim, &frame) else {
            panic!("expected a hit");
        };
        assert_eq!(info.crop_rect.origin().x, 37);
        assert_eq!(info.crop_rect.origin().y, 12);
        assert_eq!((info.crop.width(), info.crop.height()), (54, 59));
        assert_eq!(info.shot_point.in_frame(info.crop_rect.origin()), aim);
    }

    #[test]
    fn crop_copies_frame_pixels() {
        let mut frame = RgbImage::new(20, 20);
        frame.put_pixel(12, 7, image::Rgb([1, 2, 3]));
        let dets = vec![det("t", 0.5, [10.0, 5.0, 15.0, 10.0])];
        let HitOutcome::Hit(info) = resolve_hit(&dets, FramePoint::new(12.0, 7.0), &frame) else {
            panic!("expected a hit");
        };
        assert_eq!(info.crop.get_pixel(2, 2), &image::Rgb([1, 2, 3]));
    }

    #[test]
    fn box_outside_frame_is_a_miss() {
        let dets = vec![det("t", 0.5, [100.0, 100.0, 120.0, 120.0])];
        let frame = RgbImage::new(50, 50);
        let out = resolve_hit(&dets, FramePoint::new(110.0, 110.0), &frame);
        assert!(!out.is_hit());
        assert_eq!(out.aim(), FramePoint::new(110.0, 110.0));
    }
}
