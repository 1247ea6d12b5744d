//! Markers drawn on result images.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use marksman_detect::Detection;

pub const PRIMARY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const ALTERNATE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
pub const FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const MISS_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 200, 255]);

/// Full length of the cross drawn at a scored point.
pub const MARKER_SIZE: u32 = 40;
pub const MARKER_THICKNESS: u32 = 3;
pub const MISS_MARKER_SIZE: u32 = 30;
pub const MISS_MARKER_THICKNESS: u32 = 2;

/// Draw a `+` centred on the pixel containing `(x, y)`.
pub fn draw_cross(image: &mut RgbImage, (x, y): (f32, f32), color: Rgb<u8>, size: u32, thickness: u32) {
    let cx = x.floor();
    let cy = y.floor();
    let half = (size / 2) as f32;
    let t = thickness.max(1) as i32;
    // Offsets -t/2 ..= (t-1)/2 keep odd thicknesses centred.
    for k in (-(t / 2))..=((t - 1) / 2) {
        let o = k as f32;
        draw_line_segment_mut(image, (cx - half, cy + o), (cx + half, cy + o), color);
        draw_line_segment_mut(image, (cx + o, cy - half), (cx + o, cy + half), color);
    }
}

/// Outline each detection box.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection], color: Rgb<u8>) {
    for d in detections {
        let Some(r) = d.bbox.pixel_rect(image.width(), image.height()) else {
            continue;
        };
        draw_hollow_rect_mut(
            image,
            Rect::at(r.x as i32, r.y as i32).of_size(r.width, r.height),
            color,
        );
    }
}
