//! Feature-based registration of target crops onto reference images.
//!
//! The pipeline is ORB-like:
//! 1. oriented FAST corners on a scale pyramid, ranked by Harris response,
//! 2. 256-bit rotated BRIEF descriptors,
//! 3. brute-force Hamming k=2 matching with a ratio test in both directions,
//!    keeping only mutual matches,
//! 4. seeded RANSAC homography from crop space to reference space.
//!
//! Registration failure is an ordinary outcome ([`Registration::Failed`]),
//! not an error: callers are expected to fall back to something else.
//!
//! ```no_run
//! use marksman_core::CropPoint;
//! use marksman_features::{Registrar, Registration, RegistrationParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reference = image::open("reference.png")?.to_luma8();
//! let crop = image::open("crop.png")?.to_luma8();
//!
//! let registrar = Registrar::new(RegistrationParams::default());
//! let prepared = registrar.prepare_reference(&reference);
//! match registrar.register(&prepared, &crop, CropPoint::new(120.0, 80.0)) {
//!     Registration::Aligned(a) => println!("reference point: {:?}", a.point),
//!     Registration::Failed(reason) => println!("no alignment: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod matcher;
mod orb;
mod params;
mod registration;

#[cfg(test)]
mod testutil;

pub use descriptor::{BriefPattern, Descriptor};
pub use matcher::{mutual_matches, ratio_matches, Correspondence, MatchParams};
pub use orb::{Features, Keypoint, OrbExtractor};
pub use params::OrbParams;
pub use registration::{
    Alignment, ReferenceFeatures, Registrar, Registration, RegistrationFailure, RegistrationParams,
};
