//! Brute-force Hamming matching with ratio test and mutual cross-check.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::Descriptor;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Lowe ratio: best distance must be strictly below `ratio * second`.
    pub ratio: f32,
    /// Minimum keypoints each image must produce before matching.
    pub min_keypoints: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            ratio: 0.75,
            min_keypoints: 10,
        }
    }
}

/// A reference keypoint paired with a crop keypoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Correspondence {
    pub reference: usize,
    pub crop: usize,
    pub distance: u32,
}

/// Two nearest neighbours of `query` in `train`: `(best_idx, best, second)`.
///
/// Ties keep the lower train index as best. `None` with fewer than two
/// train descriptors.
fn two_nearest(query: &Descriptor, train: &[Descriptor]) -> Option<(usize, u32, u32)> {
    if train.len() < 2 {
        return None;
    }
    let mut best = (usize::MAX, u32::MAX);
    let mut second = u32::MAX;
    for (idx, t) in train.iter().enumerate() {
        let d = query.hamming(t);
        if d < best.1 {
            second = best.1;
            best = (idx, d);
        } else if d < second {
            second = d;
        }
    }
    Some((best.0, best.1, second))
}

/// One-directional k=2 matches of `query` against `train` passing the ratio
/// test, as `(query_idx, train_idx, distance)`.
pub fn ratio_matches(
    query: &[Descriptor],
    train: &[Descriptor],
    ratio: f32,
) -> Vec<(usize, usize, u32)> {
    query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let (ti, best, second) = two_nearest(q, train)?;
            ((best as f32) < ratio * second as f32).then_some((qi, ti, best))
        })
        .collect()
}

/// Matches that pass the ratio test in both directions and agree with each
/// other: reference `i` -> crop `j` survives only if crop `j` -> reference
/// `i` also survived.
///
/// Result order follows reference index.
pub fn mutual_matches(
    reference: &[Descriptor],
    crop: &[Descriptor],
    ratio: f32,
) -> Vec<Correspondence> {
    let backward: HashSet<(usize, usize)> = ratio_matches(crop, reference, ratio)
        .into_iter()
        .map(|(ci, ri, _)| (ri, ci))
        .collect();

    ratio_matches(reference, crop, ratio)
        .into_iter()
        .filter(|(ri, ci, _)| backward.contains(&(*ri, *ci)))
        .map(|(reference, crop, distance)| Correspondence {
            reference,
            crop,
            distance,
        })
        .collect()
}
