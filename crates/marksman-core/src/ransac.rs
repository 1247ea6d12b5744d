//! Robust homography estimation with a seeded RANSAC loop.

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{estimate_homography, homography_from_4pt, Homography};

/// Configuration for RANSAC homography fitting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum reprojection error (pixels, destination space) for an inlier.
    pub reproj_threshold: f32,
    /// Hard cap on hypothesis count.
    pub max_iters: usize,
    /// Desired probability of drawing at least one outlier-free sample; the
    /// iteration count shrinks adaptively as the inlier ratio improves.
    pub confidence: f64,
    /// RNG seed. Same inputs and seed give the same model.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 4.0,
            max_iters: 2000,
            confidence: 0.995,
            seed: 0,
        }
    }
}

/// Result of a RANSAC fit.
#[derive(Clone, Debug)]
pub struct RansacHomography {
    /// Maps `src` points onto `dst` points.
    pub h: Homography,
    pub inlier_mask: Vec<bool>,
    pub num_inliers: usize,
}

impl RansacHomography {
    /// Mean transfer error over inliers, or `None` if there are none.
    pub fn mean_inlier_error(&self, src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<f32> {
        if self.num_inliers == 0 {
            return None;
        }
        let sum: f32 = self
            .inlier_mask
            .iter()
            .zip(src.iter().zip(dst))
            .filter(|(&m, _)| m)
            .map(|(_, (s, d))| self.h.transfer_error(*s, *d))
            .sum();
        Some(sum / self.num_inliers as f32)
    }
}

/// Fit `dst ~ H * src` robustly.
///
/// Samples 4-point minimal subsets, keeps the hypothesis with the most
/// inliers, then refits on all inliers with the normalized DLT and recounts.
/// Returns `None` with fewer than 4 correspondences or when no sample yields
/// a usable model.
pub fn ransac_homography(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Option<RansacHomography> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut iter_limit = params.max_iters;
    let mut iter = 0usize;

    while iter < iter_limit {
        iter += 1;

        let idx = sample_four(&mut rng, n);
        let s = idx.map(|i| src[i]);
        let d = idx.map(|i| dst[i]);
        if has_collinear_triple(&s) || has_collinear_triple(&d) {
            continue;
        }
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };

        let (mask, count) = score_inliers(&h, src, dst, params.reproj_threshold);
        let improved = best.as_ref().is_none_or(|(_, _, c)| count > *c);
        if improved {
            iter_limit = iter_limit.min(adaptive_iterations(
                count as f64 / n as f64,
                params.confidence,
                params.max_iters,
            ));
            best = Some((h, mask, count));
        }
    }

    let (h, mask, count) = best?;
    if count < 4 {
        return Some(RansacHomography {
            h,
            inlier_mask: mask,
            num_inliers: count,
        });
    }

    let (in_src, in_dst): (Vec<_>, Vec<_>) = mask
        .iter()
        .zip(src.iter().zip(dst))
        .filter(|(&m, _)| m)
        .map(|(_, (s, d))| (*s, *d))
        .unzip();

    let refined = estimate_homography(&in_src, &in_dst).unwrap_or(h);
    let (final_mask, final_count) = score_inliers(&refined, src, dst, params.reproj_threshold);

    // Keep the refit only if it does not lose support.
    if final_count >= count {
        Some(RansacHomography {
            h: refined,
            inlier_mask: final_mask,
            num_inliers: final_count,
        })
    } else {
        Some(RansacHomography {
            h,
            inlier_mask: mask,
            num_inliers: count,
        })
    }
}

fn score_inliers(
    h: &Homography,
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    threshold: f32,
) -> (Vec<bool>, usize) {
    let mut count = 0usize;
    let mask = src
        .iter()
        .zip(dst)
        .map(|(s, d)| {
            let inlier = h.transfer_error(*s, *d) <= threshold;
            count += inlier as usize;
            inlier
        })
        .collect();
    (mask, count)
}

/// Iterations needed to hit `confidence` with inlier ratio `w`.
fn adaptive_iterations(w: f64, confidence: f64, max_iters: usize) -> usize {
    let p_good = w.powi(4);
    if p_good <= f64::EPSILON {
        return max_iters;
    }
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    let num = (1.0 - confidence).max(f64::MIN_POSITIVE).ln();
    let den = (1.0 - p_good).ln();
    let k = (num / den).ceil();
    if k.is_finite() && k >= 0.0 {
        (k as usize).clamp(1, max_iters)
    } else {
        max_iters
    }
}

/// Four distinct indices from `0..n` (partial Fisher-Yates without the
/// full index vector).
fn sample_four(rng: &mut StdRng, n: usize) -> [usize; 4] {
    let mut out = [0usize; 4];
    let mut k = 0;
    while k < 4 {
        let candidate = rng.gen_range(0..n);
        if !out[..k].contains(&candidate) {
            out[k] = candidate;
            k += 1;
        }
    }
    out
}

fn has_collinear_triple(pts: &[Point2<f32>; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(a, b, c)| {
        let (pa, pb, pc) = (pts[a], pts[b], pts[c]);
        let cross = (pb.x - pa.x) as f64 * (pc.y - pa.y) as f64
            - (pb.y - pa.y) as f64 * (pc.x - pa.x) as f64;
        cross.abs() < 1e-3
    })
}
