//! Oriented FAST keypoints with rotated BRIEF descriptors on a scale pyramid.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::filter::gaussian_blur_f32;
use marksman_core::GrayImageView;
use nalgebra::Point2;

use crate::{BriefPattern, Descriptor, OrbParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A keypoint in level-0 (input image) pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Patch orientation in radians.
    pub angle: f32,
    /// Harris corner response at the detection level.
    pub response: f32,
    /// Pyramid level the keypoint was found on.
    pub octave: u8,
    /// Patch diameter in level-0 pixels.
    pub size: f32,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Clone, Debug, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn point(&self, idx: usize) -> Point2<f32> {
        let kp = &self.keypoints[idx];
        Point2::new(kp.x, kp.y)
    }
}

struct Level {
    image: GrayImage,
    scale: f32,
}

/// Fixed-budget, scale- and rotation-tolerant keypoint extractor.
#[derive(Clone, Debug)]
pub struct OrbExtractor {
    params: OrbParams,
    pattern: BriefPattern,
}

impl OrbExtractor {
    pub fn new(params: OrbParams) -> Self {
        // Two pixels of slack keep rotated samples inside the patch.
        let pattern = BriefPattern::new((params.half_patch() - 2).max(1));
        Self { params, pattern }
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Detect keypoints and compute descriptors. Deterministic for a given
    /// image and parameter set.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width(), height = image.height()))
    )]
    pub fn extract(&self, image: &GrayImage) -> Features {
        let pyramid = self.build_pyramid(image);
        let quotas = self.params.level_quotas(pyramid.len());
        let mut features = Features::default();

        for (octave, (level, quota)) in pyramid.iter().zip(quotas).enumerate() {
            if quota == 0 {
                continue;
            }
            let corners = self.detect_level(&level.image, quota);
            if corners.is_empty() {
                continue;
            }

            let smoothed = if self.params.descriptor_blur_sigma > 0.0 {
                gaussian_blur_f32(&level.image, self.params.descriptor_blur_sigma)
            } else {
                level.image.clone()
            };
            let raw = view(&level.image);
            let smooth = view(&smoothed);

            for (x, y, response) in corners {
                let angle = intensity_centroid_angle(&raw, x as i32, y as i32, self.params.half_patch());
                let descriptor = self.pattern.describe(&smooth, x as i32, y as i32, angle);
                features.keypoints.push(Keypoint {
                    x: x as f32 * level.scale,
                    y: y as f32 * level.scale,
                    angle,
                    response,
                    octave: octave as u8,
                    size: self.params.patch_size as f32 * level.scale,
                });
                features.descriptors.push(descriptor);
            }
        }

        log::debug!(
            "extracted {} keypoints over {} pyramid levels ({}x{})",
            features.len(),
            pyramid.len(),
            image.width(),
            image.height()
        );
        features
    }

    fn build_pyramid(&self, image: &GrayImage) -> Vec<Level> {
        let min_side = 2 * self.params.border() + 1;
        let mut levels: Vec<Level> = Vec::with_capacity(self.params.n_levels);
        for i in 0..self.params.n_levels.max(1) {
            let scale = self.params.scale_factor.max(1.0).powi(i as i32);
            let w = (image.width() as f32 / scale).round() as u32;
            let h = (image.height() as f32 / scale).round() as u32;
            if w < min_side || h < min_side {
                break;
            }
            let level_image = if i == 0 {
                image.clone()
            } else {
                imageops::resize(image, w, h, FilterType::Triangle)
            };
            levels.push(Level {
                image: level_image,
                scale,
            });
        }
        levels
    }

    /// FAST corners with 3x3 non-maximum suppression, kept away from the
    /// border, ranked by Harris response and truncated to `quota`.
    fn detect_level(&self, image: &GrayImage, quota: usize) -> Vec<(u32, u32, f32)> {
        let border = self.params.border();
        let (w, h) = image.dimensions();
        let corners: Vec<Corner> = corners_fast9(image, self.params.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= border && c.y >= border && c.x < w - border && c.y < h - border)
            .collect();

        let src = view(image);
        let mut ranked: Vec<(u32, u32, f32)> = suppress_non_maxima(&corners, w, h)
            .into_iter()
            .map(|c| (c.x, c.y, harris_response(&src, c.x, c.y, self.params.harris_k)))
            .collect();

        ranked.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then(a.1.cmp(&b.1))
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(quota);
        ranked
    }
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new(OrbParams::default())
    }
}

fn view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

fn suppress_non_maxima(corners: &[Corner], width: u32, height: u32) -> Vec<Corner> {
    let w = width as usize;
    let mut scores = vec![0.0_f32; w * height as usize];
    for c in corners {
        scores[c.y as usize * w + c.x as usize] = c.score;
    }

    corners
        .iter()
        .filter(|c| {
            let own_idx = c.y as usize * w + c.x as usize;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = c.x as i32 + dx;
                    let ny = c.y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                        continue;
                    }
                    let idx = ny as usize * w + nx as usize;
                    let other = scores[idx];
                    // Equal scores: the earlier pixel in raster order wins.
                    if other > c.score || (other == c.score && idx < own_idx) {
                        return false;
                    }
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Harris corner measure over a 7x7 window of central-difference gradients.
fn harris_response(img: &GrayImageView<'_>, x: u32, y: u32, k: f32) -> f32 {
    const R: i32 = 3;
    let (x, y) = (x as i32, y as i32);
    let (mut sxx, mut syy, mut sxy) = (0.0_f32, 0.0_f32, 0.0_f32);
    for dy in -R..=R {
        for dx in -R..=R {
            let px = x + dx;
            let py = y + dy;
            let ix = img.get(px + 1, py) as f32 - img.get(px - 1, py) as f32;
            let iy = img.get(px, py + 1) as f32 - img.get(px, py - 1) as f32;
            sxx += ix * ix;
            syy += iy * iy;
            sxy += ix * iy;
        }
    }
    let trace = sxx + syy;
    sxx * syy - sxy * sxy - k * trace * trace
}

/// Orientation of the intensity centroid within a disc of `radius`.
fn intensity_centroid_angle(img: &GrayImageView<'_>, x: i32, y: i32, radius: i32) -> f32 {
    let r2 = radius * radius;
    let (mut m10, mut m01) = (0.0_f64, 0.0_f64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = img.get(x + dx, y + dy) as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10) as f32
}
