use image::imageops::{self, FilterType};
use image::GrayImage;

/// Mask values at or above this are scoreable.
const ON_THRESHOLD: u8 = 128;

/// Binary image marking the legitimate target-face area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoringMask {
    width: u32,
    height: u32,
    valid: Vec<bool>,
}

impl ScoringMask {
    /// Binarise a grayscale mask.
    pub fn from_luma(mask: &GrayImage) -> Self {
        Self {
            width: mask.width(),
            height: mask.height(),
            valid: mask.as_raw().iter().map(|&v| v >= ON_THRESHOLD).collect(),
        }
    }

    /// Binarise `mask` after a nearest-neighbour resize to `width x height`.
    pub fn from_luma_resized(mask: &GrayImage, width: u32, height: u32) -> Self {
        if mask.dimensions() == (width, height) {
            return Self::from_luma(mask);
        }
        let resized = imageops::resize(mask, width, height, FilterType::Nearest);
        Self::from_luma(&resized)
    }

    /// Everything scoreable.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            valid: vec![true; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `false` outside the mask bounds.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.valid[y as usize * self.width as usize + x as usize]
    }

    /// Nearest-neighbour resample to new dimensions.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }
        let mut valid = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let sy = ((y as u64 * self.height as u64) / height.max(1) as u64) as u32;
            for x in 0..width {
                let sx = ((x as u64 * self.width as u64) / width.max(1) as u64) as u32;
                valid.push(self.contains(sx, sy));
            }
        }
        Self {
            width,
            height,
            valid,
        }
    }

    /// Scoreable pixel count.
    pub fn area(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}
