//! 256-bit binary descriptors and the rotated BRIEF sampling pattern.

use marksman_core::GrayImageView;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DESCRIPTOR_BITS: usize = 256;

const PATTERN_SEED: u64 = 0x0b1e_f00d_2561;

/// Packed 256-bit binary descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub bits: [u64; 4],
}

impl Descriptor {
    #[inline]
    pub fn hamming(&self, other: &Self) -> u32 {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    #[inline]
    fn set(&mut self, bit: usize) {
        self.bits[bit / 64] |= 1u64 << (bit % 64);
    }

    pub fn get(&self, bit: usize) -> bool {
        self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
    }
}

/// Point-pair sampling pattern for BRIEF tests, expressed as offsets from
/// the keypoint in the keypoint's own (unrotated) frame.
#[derive(Clone, Debug)]
pub struct BriefPattern {
    pairs: Vec<[(i8, i8); 2]>,
    radius: i32,
}

impl BriefPattern {
    /// Deterministic pattern with all sample points inside a disc of
    /// `radius` pixels, so that any rotation stays inside the same disc.
    pub fn new(radius: i32) -> Self {
        let radius = radius.clamp(1, 127);
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let r2 = radius * radius;
        let sample = |rng: &mut StdRng| loop {
            let x = rng.gen_range(-radius..=radius);
            let y = rng.gen_range(-radius..=radius);
            if x * x + y * y <= r2 {
                return (x as i8, y as i8);
            }
        };

        let mut pairs = Vec::with_capacity(DESCRIPTOR_BITS);
        while pairs.len() < DESCRIPTOR_BITS {
            let a = sample(&mut rng);
            let b = sample(&mut rng);
            if a != b {
                pairs.push([a, b]);
            }
        }
        Self { pairs, radius }
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Describe the patch around `(x, y)` in `smoothed`, steered by `angle`
    /// (radians).
    pub fn describe(&self, smoothed: &GrayImageView<'_>, x: i32, y: i32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let mut desc = Descriptor::default();
        for (bit, [a, b]) in self.pairs.iter().enumerate() {
            let va = sample_rotated(smoothed, x, y, *a, sin, cos);
            let vb = sample_rotated(smoothed, x, y, *b, sin, cos);
            if va < vb {
                desc.set(bit);
            }
        }
        desc
    }
}

#[inline]
fn sample_rotated(img: &GrayImageView<'_>, x: i32, y: i32, p: (i8, i8), sin: f32, cos: f32) -> u8 {
    let (px, py) = (p.0 as f32, p.1 as f32);
    let rx = (cos * px - sin * py).round() as i32;
    let ry = (sin * px + cos * py).round() as i32;
    img.get(x + rx, y + ry)
}
