#![allow(dead_code)]

use std::path::Path;

use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use marksman::detect::{BoundingBox, Detection};
use marksman::zones::{RadialBand, ZoneTable};
use marksman::{TargetProfile, TrainerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random gray rectangles: a corner-rich, non-repetitive stand-in for a
/// photographed target face.
pub fn blocks(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    for _ in 0..(width * height / 300) {
        let bw = rng.gen_range(4..24);
        let bh = rng.gen_range(4..24);
        let x0 = rng.gen_range(0..width.saturating_sub(bw).max(1));
        let y0 = rng.gen_range(0..height.saturating_sub(bh).max(1));
        let v = rng.gen_range(0..=255u8);
        for y in y0..(y0 + bh).min(height) {
            for x in x0..(x0 + bw).min(width) {
                img.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
    }
    img
}

/// The central half of `reference`, upscaled 2x back to full size.
pub fn upscaled_centre(reference: &RgbImage) -> RgbImage {
    let (w, h) = reference.dimensions();
    let centre = imageops::crop_imm(reference, w / 4, h / 4, w / 2, h / 2).to_image();
    imageops::resize(&centre, w, h, imageops::FilterType::Triangle)
}

/// A flat 640x480 frame with `patch` pasted at `(x, y)`, and a detection
/// box exactly covering the patch.
pub fn frame_with(patch: &RgbImage, x: u32, y: u32, label: &str) -> (RgbImage, Detection) {
    let mut frame = RgbImage::from_pixel(640, 480, Rgb([60, 60, 60]));
    imageops::replace(&mut frame, patch, x as i64, y as i64);
    let det = Detection::new(
        label,
        0.9,
        BoundingBox::new(
            x as f32,
            y as f32,
            (x + patch.width()) as f32,
            (y + patch.height()) as f32,
        ),
    );
    (frame, det)
}

/// Bullseye of radius 20 inside a 5-ring of radius 100, centred on the image.
pub fn bullseye() -> ZoneTable {
    ZoneTable::Radial {
        center: None,
        bands: vec![
            RadialBand {
                score: 10,
                radius: 20.0,
            },
            RadialBand {
                score: 5,
                radius: 100.0,
            },
        ],
    }
}

pub fn profile(name: &str) -> TargetProfile {
    TargetProfile {
        name: name.to_string(),
        labels: vec![name.to_string()],
        zones: bullseye(),
        min_inliers: None,
    }
}

pub fn config(root: &Path, names: &[&str]) -> TrainerConfig {
    let mut cfg = TrainerConfig::default();
    cfg.asset_root = root.to_path_buf();
    cfg.targets = names.iter().map(|n| profile(n)).collect();
    cfg
}

pub fn full_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([255]))
}

/// Write `original/<name>.png` and `mask/mask_<name>.png` under `root`.
pub fn write_assets(root: &Path, name: &str, reference: &RgbImage) {
    std::fs::create_dir_all(root.join("original")).expect("mkdir original");
    std::fs::create_dir_all(root.join("mask")).expect("mkdir mask");
    reference
        .save(root.join("original").join(format!("{name}.png")))
        .expect("save reference");
    full_mask(reference.width(), reference.height())
        .save(root.join("mask").join(format!("mask_{name}.png")))
        .expect("save mask");
}
