use serde::{Deserialize, Serialize};

/// Keypoint detector and descriptor parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    /// Total keypoint budget across all pyramid levels.
    pub n_features: usize,
    /// Downscale factor between consecutive pyramid levels.
    pub scale_factor: f32,
    pub n_levels: usize,
    /// Keypoints closer than this to the level border are discarded.
    pub edge_threshold: u32,
    /// Side of the square patch the orientation and descriptor are computed
    /// from. Must be odd.
    pub patch_size: u32,
    /// FAST-9 intensity threshold.
    pub fast_threshold: u8,
    /// Harris detector free parameter.
    pub harris_k: f32,
    /// Gaussian sigma applied before sampling descriptor pairs.
    pub descriptor_blur_sigma: f32,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 1500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 15,
            patch_size: 31,
            fast_threshold: 20,
            harris_k: 0.04,
            descriptor_blur_sigma: 2.0,
        }
    }
}

impl OrbParams {
    pub(crate) fn half_patch(&self) -> i32 {
        (self.patch_size / 2) as i32
    }

    /// Distance from the level border a keypoint must keep so that its
    /// patch is fully inside the image.
    pub(crate) fn border(&self) -> u32 {
        self.edge_threshold.max(self.patch_size / 2 + 1)
    }

    /// Keypoint budget per pyramid level, geometric in the scale factor.
    pub(crate) fn level_quotas(&self, levels: usize) -> Vec<usize> {
        if levels == 0 {
            return Vec::new();
        }
        let factor = 1.0 / self.scale_factor.max(1.0001) as f64;
        let first =
            self.n_features as f64 * (1.0 - factor) / (1.0 - factor.powi(levels as i32));

        let mut quotas = Vec::with_capacity(levels);
        let mut assigned = 0usize;
        let mut desired = first;
        for _ in 0..levels - 1 {
            let q = desired.round() as usize;
            quotas.push(q);
            assigned += q;
            desired *= factor;
        }
        quotas.push(self.n_features.saturating_sub(assigned));
        quotas
    }
}
