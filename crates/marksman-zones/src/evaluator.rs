use marksman_core::ReferencePoint;

use crate::{ScoringMask, ZoneTable};

/// Score a reference-space point.
///
/// The point is snapped to the pixel containing it (coordinates floored)
/// before any test. Returns 0 for `None`, for pixels outside the
/// `width x height` reference image, for pixels outside the mask and for
/// pixels outside every zone.
pub fn evaluate(
    point: Option<ReferencePoint>,
    mask: &ScoringMask,
    zones: &ZoneTable,
    (width, height): (u32, u32),
) -> u32 {
    let Some(point) = point else {
        return 0;
    };
    let Some((x, y)) = point.pixel_within(width, height) else {
        return 0;
    };
    if !mask.contains(x, y) {
        return 0;
    }
    zones.score_at(ReferencePoint::new(x as f32, y as f32), width, height)
}

/// Mask and zones of one reference image, bundled with its size.
#[derive(Clone, Debug)]
pub struct ScoringTemplate {
    mask: ScoringMask,
    zones: ZoneTable,
}

impl ScoringTemplate {
    /// The template's size is the mask's size.
    pub fn new(mask: ScoringMask, zones: ZoneTable) -> Self {
        Self { mask, zones }
    }

    pub fn mask(&self) -> &ScoringMask {
        &self.mask
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    pub fn score(&self, point: Option<ReferencePoint>) -> u32 {
        evaluate(point, &self.mask, &self.zones, self.mask.dimensions())
    }

    /// The same target face at a different reference resolution.
    pub fn rescaled(&self, width: u32, height: u32) -> Self {
        let (w0, h0) = self.dimensions();
        let sx = width as f32 / w0.max(1) as f32;
        let sy = height as f32 / h0.max(1) as f32;
        Self {
            mask: self.mask.resized(width, height),
            zones: self.zones.scaled(sx, sy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{preset, EllipseRing, RadialBand};

    fn bull(width: u32, height: u32) -> ScoringTemplate {
        ScoringTemplate::new(
            ScoringMask::full(width, height),
            ZoneTable::Radial {
                center: None,
                bands: vec![
                    RadialBand {
                        score: 10,
                        radius: 10.0,
                    },
                    RadialBand {
                        score: 9,
                        radius: 30.0,
                    },
                    RadialBand {
                        score: 8,
                        radius: 60.0,
                    },
                ],
            },
        )
    }

    #[test]
    fn none_and_out_of_bounds_score_zero() {
        let t = bull(200, 200);
        assert_eq!(t.score(None), 0);
        assert_eq!(t.score(Some(ReferencePoint::new(-0.5, 100.0))), 0);
        assert_eq!(t.score(Some(ReferencePoint::new(200.0, 100.0))), 0);
        assert_eq!(t.score(Some(ReferencePoint::new(100.4, 100.9))), 10);
    }

    #[test]
    fn radial_score_never_increases_outwards() {
        let t = bull(200, 200);
        for (dx, dy) in [(1.0_f32, 0.0_f32), (0.6, 0.8), (-0.7, 0.7), (0.0, -1.0)] {
            let mut last = u32::MAX;
            for step in 0..150 {
                let r = step as f32 * 0.75;
                let s = t.score(Some(ReferencePoint::new(100.0 + dx * r, 100.0 + dy * r)));
                assert!(s <= last, "score rose from {last} to {s} at r={r}");
                last = s;
            }
            assert_eq!(last, 0);
        }
    }

    #[test]
    fn elliptical_score_never_increases_outwards() {
        let Some(zones) = preset("bia_so_8") else {
            panic!("missing preset");
        };
        let t = ScoringTemplate::new(ScoringMask::full(180, 240), zones);
        let [cx, cy] = t.zones().center(180, 240);
        for (dx, dy) in [(1.0_f32, 0.0_f32), (0.0, 1.0), (-0.6, -0.8), (0.8, -0.6)] {
            let mut last = u32::MAX;
            for step in 0..200 {
                let r = step as f32 * 1.3;
                let s = t.score(Some(ReferencePoint::new(cx + dx * r, cy + dy * r)));
                assert!(s <= last, "score rose from {last} to {s} at r={r}");
                last = s;
            }
        }
    }

    #[test]
    fn mask_gates_every_ring() {
        let zones = ZoneTable::Elliptical {
            center: [50.0, 50.0],
            rings: vec![
                EllipseRing {
                    score: 10,
                    width: 20.0,
                    height: 20.0,
                },
                EllipseRing {
                    score: 5,
                    width: 90.0,
                    height: 90.0,
                },
            ],
        };
        let mut img = image::GrayImage::new(100, 100);
        // Only the left half of the face is valid.
        for y in 0..100 {
            for x in 0..50 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
        let mask = ScoringMask::from_luma(&img);
        let shape = (100, 100);
        assert_eq!(evaluate(Some(ReferencePoint::new(45.0, 50.0)), &mask, &zones, shape), 10);
        assert_eq!(evaluate(Some(ReferencePoint::new(50.0, 50.0)), &mask, &zones, shape), 0);
        assert_eq!(evaluate(Some(ReferencePoint::new(80.0, 50.0)), &mask, &zones, shape), 0);
        assert_eq!(evaluate(Some(ReferencePoint::new(20.0, 50.0)), &mask, &zones, shape), 5);
    }

    #[test]
    fn rescaled_template_scores_the_same_spot() {
        let t = bull(200, 100);
        let big = t.rescaled(400, 200);
        assert_eq!(big.dimensions(), (400, 200));
        assert_eq!(
            t.score(Some(ReferencePoint::new(125.0, 50.0))),
            big.score(Some(ReferencePoint::new(250.0, 100.0)))
        );
    }
}
