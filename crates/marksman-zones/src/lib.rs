//! Scoring geometry for paper targets.
//!
//! A score is looked up in reference-image space: the point must lie inside
//! the image, inside the target's scoring mask, and inside one of the zones
//! of its [`ZoneTable`]. Anything else scores 0.

mod evaluator;
mod mask;
mod presets;
mod zones;

pub use evaluator::{evaluate, ScoringTemplate};
pub use mask::ScoringMask;
pub use presets::{preset, PRESET_NAMES};
pub use zones::{EllipseRing, RadialBand, ZoneError, ZoneTable};
