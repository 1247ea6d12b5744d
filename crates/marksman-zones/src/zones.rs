use marksman_core::ReferencePoint;
use serde::{Deserialize, Serialize};

/// Circle of `radius` pixels; points strictly closer than `radius` to the
/// centre score `score`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadialBand {
    pub score: u32,
    pub radius: f32,
}

/// Axis-aligned ellipse with full axis lengths `width` x `height`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipseRing {
    pub score: u32,
    pub width: f32,
    pub height: f32,
}

impl EllipseRing {
    #[inline]
    fn contains(&self, dx: f32, dy: f32) -> bool {
        let a = self.width / 2.0;
        let b = self.height / 2.0;
        (dx / a).powi(2) + (dy / b).powi(2) <= 1.0
    }
}

/// Concentric scoring zones of one target face, listed from the highest
/// score (innermost) outwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneTable {
    Radial {
        /// `None` centres the bands on the reference image
        /// (`width / 2, height / 2`, integer division).
        #[serde(default)]
        center: Option<[f32; 2]>,
        bands: Vec<RadialBand>,
    },
    Elliptical {
        center: [f32; 2],
        rings: Vec<EllipseRing>,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ZoneError {
    #[error("zone table has no zones")]
    Empty,
    #[error("zone {index} has a non-positive or non-finite size")]
    InvalidSize { index: usize },
    #[error("zone {index} must score lower than the zone inside it")]
    ScoreOrder { index: usize },
    #[error("zone {index} is smaller than the zone inside it")]
    NotNested { index: usize },
}

impl ZoneTable {
    /// Check that zones are non-empty, nested and ordered by descending score.
    pub fn validate(&self) -> Result<(), ZoneError> {
        // (score, sizes) per zone, innermost first.
        let zones: Vec<(u32, [f32; 2])> = match self {
            Self::Radial { bands, .. } => bands
                .iter()
                .map(|b| (b.score, [b.radius, b.radius]))
                .collect(),
            Self::Elliptical { rings, .. } => {
                rings.iter().map(|r| (r.score, [r.width, r.height])).collect()
            }
        };
        if zones.is_empty() {
            return Err(ZoneError::Empty);
        }
        for (index, (_, size)) in zones.iter().enumerate() {
            if size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return Err(ZoneError::InvalidSize { index });
            }
        }
        for (index, pair) in zones.windows(2).enumerate() {
            let (inner, outer) = (pair[0], pair[1]);
            if outer.0 >= inner.0 {
                return Err(ZoneError::ScoreOrder { index: index + 1 });
            }
            if outer.1[0] < inner.1[0] || outer.1[1] < inner.1[1] {
                return Err(ZoneError::NotNested { index: index + 1 });
            }
        }
        Ok(())
    }

    /// Zone centre for a reference image of the given size.
    pub fn center(&self, width: u32, height: u32) -> [f32; 2] {
        match self {
            Self::Radial {
                center: Some(c), ..
            } => *c,
            Self::Radial { center: None, .. } => [(width / 2) as f32, (height / 2) as f32],
            Self::Elliptical { center, .. } => *center,
        }
    }

    pub fn max_score(&self) -> u32 {
        match self {
            Self::Radial { bands, .. } => bands.iter().map(|b| b.score).max().unwrap_or(0),
            Self::Elliptical { rings, .. } => rings.iter().map(|r| r.score).max().unwrap_or(0),
        }
    }

    /// Score of the innermost zone containing `point`, or 0.
    ///
    /// Only geometry: bounds and mask checks belong to [`crate::evaluate`].
    pub fn score_at(&self, point: ReferencePoint, width: u32, height: u32) -> u32 {
        let [cx, cy] = self.center(width, height);
        let dx = point.x - cx;
        let dy = point.y - cy;
        match self {
            Self::Radial { bands, .. } => {
                let dist = dx.hypot(dy);
                bands
                    .iter()
                    .find(|b| dist < b.radius)
                    .map_or(0, |b| b.score)
            }
            Self::Elliptical { rings, .. } => rings
                .iter()
                .find(|r| r.contains(dx, dy))
                .map_or(0, |r| r.score),
        }
    }

    /// The same table for a reference image scaled by `sx` x `sy`.
    ///
    /// Radial radii scale by the mean of both factors. A radial table
    /// centred on the image stays centred.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        match self {
            Self::Radial { center, bands } => {
                let s = (sx + sy) / 2.0;
                Self::Radial {
                    center: center.map(|[x, y]| [x * sx, y * sy]),
                    bands: bands
                        .iter()
                        .map(|b| RadialBand {
                            score: b.score,
                            radius: b.radius * s,
                        })
                        .collect(),
                }
            }
            Self::Elliptical { center, rings } => Self::Elliptical {
                center: [center[0] * sx, center[1] * sy],
                rings: rings
                    .iter()
                    .map(|r| EllipseRing {
                        score: r.score,
                        width: r.width * sx,
                        height: r.height * sy,
                    })
                    .collect(),
            },
        }
    }
}
