use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random overlapping rectangles of random intensity: plenty of corners and
/// no repetitive structure.
pub(crate) fn blocks(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::from_pixel(width, height, Luma([90]));
    for _ in 0..(width * height / 300) {
        let bw = rng.gen_range(4..24);
        let bh = rng.gen_range(4..24);
        let x0 = rng.gen_range(0..width.saturating_sub(bw).max(1));
        let y0 = rng.gen_range(0..height.saturating_sub(bh).max(1));
        let v = rng.gen_range(0..=255u8);
        for y in y0..(y0 + bh).min(height) {
            for x in x0..(x0 + bw).min(width) {
                img.put_pixel(x, y, Luma([v]));
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_is_seeded_and_handles_tiny_images() {
        assert_eq!(blocks(64, 48, 9), blocks(64, 48, 9));
        assert_ne!(blocks(64, 48, 9), blocks(64, 48, 10));
        let tiny = blocks(20, 16, 1);
        assert_eq!(tiny.dimensions(), (20, 16));
    }
}
