//! Core geometry for the marksman shot scorer.
//!
//! This crate knows nothing about detectors, targets or scoring. It provides:
//! - coordinate-space tagged points (`FramePoint`, `CropPoint`, `ReferencePoint`)
//!   and typed transforms between spaces,
//! - homography estimation (4-point, normalized DLT) and a seeded RANSAC
//!   estimator,
//! - a lightweight grayscale image view with bilinear sampling and
//!   perspective warping,
//! - a minimal logger.

mod homography;
mod image;
mod logger;
mod ransac;
mod space;

pub use homography::{estimate_homography, homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use ransac::{ransac_homography, RansacHomography, RansacParams};
pub use space::{
    CoordinateSpace, Crop, CropPoint, Frame, FramePoint, PixelOrigin, Reference, ReferencePoint,
    SpacePoint, SpaceTransform,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
