//! Zone tables of the stock paper targets, in pixels of their reference
//! images.

use crate::{EllipseRing, RadialBand, ZoneTable};

pub const PRESET_NAMES: [&str; 3] = ["bia_so_4", "bia_so_7", "bia_so_8"];

/// Built-in zone table by target name.
pub fn preset(name: &str) -> Option<ZoneTable> {
    match name {
        "bia_so_4" => Some(radial(&[
            (10, 56.0),
            (9, 116.0),
            (8, 173.0),
            (7, 230.0),
            (6, 285.0),
            (5, 320.0),
        ])),
        "bia_so_7" => Some(elliptical(
            [136.0, 177.0],
            &[
                (10, 63.0, 95.0),
                (9, 126.0, 190.0),
                (8, 189.0, 284.0),
                (7, 252.0, 378.0),
                (6, 309.0, 464.0),
                (5, 375.0, 562.0),
                (4, 436.0, 654.0),
                (3, 497.0, 746.0),
                (2, 557.0, 836.0),
                (1, 613.0, 920.0),
            ],
        )),
        // Ring 5 shares ring 6's height on the printed face.
        "bia_so_8" => Some(elliptical(
            [87.0, 116.0],
            &[
                (10, 42.0, 63.0),
                (9, 84.0, 126.0),
                (8, 126.0, 190.0),
                (7, 172.0, 258.0),
                (6, 216.0, 324.0),
                (5, 260.0, 324.0),
                (4, 304.0, 456.0),
                (3, 348.0, 522.0),
                (2, 392.0, 588.0),
                (1, 436.0, 654.0),
            ],
        )),
        _ => None,
    }
}

fn radial(bands: &[(u32, f32)]) -> ZoneTable {
    ZoneTable::Radial {
        center: None,
        bands: bands
            .iter()
            .map(|&(score, radius)| RadialBand { score, radius })
            .collect(),
    }
}

fn elliptical(center: [f32; 2], rings: &[(u32, f32, f32)]) -> ZoneTable {
    ZoneTable::Elliptical {
        center,
        rings: rings
            .iter()
            .map(|&(score, width, height)| EllipseRing {
                score,
                width,
                height,
            })
            .collect(),
    }
}
