use marksman_core::{FramePoint, PixelOrigin};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixels, `(x1, y1)` top-left, `(x2, y2)`
/// bottom-right. Not guaranteed to lie inside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, p: FramePoint) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    pub fn iou(&self, other: &Self) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Integer pixel rectangle covering the box, clamped to a
    /// `width x height` frame. `None` if nothing of it is inside.
    pub fn pixel_rect(&self, width: u32, height: u32) -> Option<PixelRect> {
        let clamp = |v: f32, hi: u32| -> u32 {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v as u32).min(hi)
            }
        };
        let x0 = clamp(self.x1.floor(), width);
        let y0 = clamp(self.y1.floor(), height);
        let x1 = clamp(self.x2.ceil(), width);
        let y1 = clamp(self.y2.ceil(), height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Integer rectangle inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn origin(&self) -> PixelOrigin {
        PixelOrigin {
            x: self.x,
            y: self.y,
        }
    }
}

/// One detected target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub label: String,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            bbox,
            confidence,
            label: label.into(),
        }
    }
}
