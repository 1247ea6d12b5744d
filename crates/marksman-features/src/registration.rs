//! Crop-to-reference registration.

use image::GrayImage;
use marksman_core::{
    ransac_homography, warp_perspective_gray, Crop, CropPoint, GrayImageView, RansacParams,
    Reference, ReferencePoint, SpaceTransform,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{mutual_matches, Features, MatchParams, OrbExtractor, OrbParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for [`Registrar`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    pub orb: OrbParams,
    pub matching: MatchParams,
    pub ransac: RansacParams,
    /// Minimum mutual matches before RANSAC and minimum RANSAC inliers after.
    pub min_inliers: usize,
    /// Largest accepted mean inlier reprojection error, in reference pixels.
    pub max_mean_reprojection_error: f32,
    /// Homographies with a smaller |det| are treated as degenerate.
    pub min_abs_determinant: f64,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            orb: OrbParams::default(),
            matching: MatchParams::default(),
            ransac: RansacParams::default(),
            min_inliers: 10,
            max_mean_reprojection_error: 5.0,
            min_abs_determinant: 1e-6,
        }
    }
}

/// Features of a reference image, computed once and reused for every shot.
#[derive(Clone, Debug)]
pub struct ReferenceFeatures {
    width: u32,
    height: u32,
    features: Features,
}

impl ReferenceFeatures {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn features(&self) -> &Features {
        &self.features
    }
}

/// Successful registration.
#[derive(Clone, Debug)]
pub struct Alignment {
    pub transform: SpaceTransform<Crop, Reference>,
    /// The requested crop point mapped into reference space.
    pub point: ReferencePoint,
    /// Mutual matches fed to RANSAC.
    pub matches: usize,
    pub inliers: usize,
    pub mean_reprojection_error: f32,
    /// The crop warped into the reference frame (debug/visualisation only).
    pub aligned: marksman_core::GrayImage,
}

/// Why a registration attempt was abandoned.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum RegistrationFailure {
    #[error("too few keypoints (reference {reference}, crop {crop}, need {required})")]
    TooFewKeypoints {
        reference: usize,
        crop: usize,
        required: usize,
    },

    #[error("only {found} mutual matches, need {required}")]
    TooFewMatches { found: usize, required: usize },

    #[error("no homography could be estimated from {matches} matches")]
    NoHomography { matches: usize },

    #[error("degenerate homography (|det| = {determinant:e})")]
    Degenerate { determinant: f64 },

    #[error("only {inliers} RANSAC inliers, need {required}")]
    TooFewInliers { inliers: usize, required: usize },

    #[error("mean reprojection error {mean_error:.2}px exceeds {limit:.2}px")]
    ReprojectionTooLarge { mean_error: f32, limit: f32 },

    #[error("transformed point is not finite")]
    NonFinitePoint,
}

/// Outcome of one registration attempt.
#[derive(Clone, Debug)]
pub enum Registration {
    Aligned(Alignment),
    Failed(RegistrationFailure),
}

impl Registration {
    pub fn is_aligned(&self) -> bool {
        matches!(self, Self::Aligned(_))
    }

    pub fn point(&self) -> Option<ReferencePoint> {
        match self {
            Self::Aligned(a) => Some(a.point),
            Self::Failed(_) => None,
        }
    }
}

/// Aligns target crops onto reference images with a single homography.
#[derive(Clone, Debug)]
pub struct Registrar {
    params: RegistrationParams,
    extractor: OrbExtractor,
}

impl Registrar {
    pub fn new(params: RegistrationParams) -> Self {
        let extractor = OrbExtractor::new(params.orb.clone());
        Self { params, extractor }
    }

    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    /// Extract reference features with this registrar's detector settings.
    pub fn prepare_reference(&self, reference: &GrayImage) -> ReferenceFeatures {
        ReferenceFeatures {
            width: reference.width(),
            height: reference.height(),
            features: self.extractor.extract(reference),
        }
    }

    /// Map `point` from `crop` into the reference image.
    ///
    /// Every abort path yields [`Registration::Failed`]; this never panics on
    /// featureless or degenerate input.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, reference, crop),
            fields(crop_w = crop.width(), crop_h = crop.height(), ref_w = reference.width())
        )
    )]
    pub fn register(
        &self,
        reference: &ReferenceFeatures,
        crop: &GrayImage,
        point: CropPoint,
    ) -> Registration {
        let crop_features = self.extractor.extract(crop);
        match self.align(reference, &crop_features, crop, point) {
            Ok(alignment) => {
                log::debug!(
                    "registered crop: {} matches, {} inliers, mean error {:.2}px -> {:?}",
                    alignment.matches,
                    alignment.inliers,
                    alignment.mean_reprojection_error,
                    alignment.point
                );
                Registration::Aligned(alignment)
            }
            Err(failure) => {
                log::debug!("registration failed: {failure}");
                Registration::Failed(failure)
            }
        }
    }

    fn align(
        &self,
        reference: &ReferenceFeatures,
        crop_features: &Features,
        crop: &GrayImage,
        point: CropPoint,
    ) -> Result<Alignment, RegistrationFailure> {
        let p = &self.params;
        let ref_features = &reference.features;
        let required_keypoints = p.matching.min_keypoints;
        if ref_features.len() < required_keypoints || crop_features.len() < required_keypoints {
            return Err(RegistrationFailure::TooFewKeypoints {
                reference: ref_features.len(),
                crop: crop_features.len(),
                required: required_keypoints,
            });
        }

        let min_inliers = p.min_inliers.max(4);
        let matches = mutual_matches(
            &ref_features.descriptors,
            &crop_features.descriptors,
            p.matching.ratio,
        );
        if matches.len() < min_inliers {
            return Err(RegistrationFailure::TooFewMatches {
                found: matches.len(),
                required: min_inliers,
            });
        }

        let (src, dst): (Vec<Point2<f32>>, Vec<Point2<f32>>) = matches
            .iter()
            .map(|m| (crop_features.point(m.crop), ref_features.point(m.reference)))
            .unzip();

        let fit = ransac_homography(&src, &dst, &p.ransac).ok_or(
            RegistrationFailure::NoHomography {
                matches: matches.len(),
            },
        )?;

        let determinant = fit.h.determinant();
        if !determinant.is_finite() || determinant.abs() < p.min_abs_determinant {
            return Err(RegistrationFailure::Degenerate { determinant });
        }

        if fit.num_inliers < min_inliers {
            return Err(RegistrationFailure::TooFewInliers {
                inliers: fit.num_inliers,
                required: min_inliers,
            });
        }

        let mean_error = fit
            .mean_inlier_error(&src, &dst)
            .unwrap_or(f32::INFINITY);
        if mean_error > p.max_mean_reprojection_error {
            return Err(RegistrationFailure::ReprojectionTooLarge {
                mean_error,
                limit: p.max_mean_reprojection_error,
            });
        }

        let transform: SpaceTransform<Crop, Reference> = SpaceTransform::new(fit.h);
        let Some(back) = transform.inverse() else {
            return Err(RegistrationFailure::Degenerate { determinant });
        };

        let mapped = transform.apply(point);
        if !mapped.x.is_finite() || !mapped.y.is_finite() {
            return Err(RegistrationFailure::NonFinitePoint);
        }

        let crop_view = GrayImageView {
            width: crop.width() as usize,
            height: crop.height() as usize,
            data: crop.as_raw(),
        };
        let aligned = warp_perspective_gray(
            &crop_view,
            *back.homography(),
            reference.width as usize,
            reference.height as usize,
        );

        Ok(Alignment {
            transform,
            point: mapped,
            matches: matches.len(),
            inliers: fit.num_inliers,
            mean_reprojection_error: mean_error,
            aligned,
        })
    }
}

impl Default for Registrar {
    fn default() -> Self {
        Self::new(RegistrationParams::default())
    }
}
