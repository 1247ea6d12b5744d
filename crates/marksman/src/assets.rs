//! Reference images, masks and precomputed features of the target types.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use marksman_features::{ReferenceFeatures, Registrar};
use marksman_zones::{ScoringMask, ScoringTemplate, ZoneError, ZoneTable};

use crate::TargetProfile;

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("missing asset {}", path.display())]
    Missing { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("empty reference image for '{0}'")]
    EmptyImage(String),
    #[error(transparent)]
    Zones(#[from] ZoneError),
}

/// On-disk layout of the reference assets under one root directory.
#[derive(Clone, Debug)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn canonical(&self, name: &str) -> PathBuf {
        self.root.join("original").join(format!("{name}.png"))
    }

    pub fn alternate(&self, name: &str) -> PathBuf {
        self.root.join("original").join(format!("{name}_1.png"))
    }

    pub fn mask(&self, name: &str) -> PathBuf {
        self.root.join("mask").join(format!("mask_{name}.png"))
    }
}

/// One reference image ready for scoring: the picture that gets annotated,
/// its scoring template and its features.
#[derive(Clone, Debug)]
pub struct ReferenceView {
    image: RgbImage,
    template: ScoringTemplate,
    features: ReferenceFeatures,
}

impl ReferenceView {
    /// `template` must have the dimensions of `image`.
    fn new(image: RgbImage, template: ScoringTemplate, registrar: &Registrar) -> Self {
        let features = registrar.prepare_reference(&image::imageops::grayscale(&image));
        Self {
            image,
            template,
            features,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn template(&self) -> &ScoringTemplate {
        &self.template
    }

    pub fn features(&self) -> &ReferenceFeatures {
        &self.features
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Everything needed to score one target type. Read-only after loading.
#[derive(Clone, Debug)]
pub struct ReferenceAsset {
    name: String,
    primary: ReferenceView,
    alternate: Option<ReferenceView>,
}

impl ReferenceAsset {
    /// Build an asset from decoded images.
    ///
    /// The mask is resized (nearest neighbour) to the canonical image. The
    /// alternate image gets the mask and zones rescaled to its own size.
    pub fn from_images(
        name: impl Into<String>,
        canonical: RgbImage,
        alternate: Option<RgbImage>,
        mask: &GrayImage,
        zones: ZoneTable,
        registrar: &Registrar,
    ) -> Result<Self, AssetError> {
        let name = name.into();
        let (w, h) = canonical.dimensions();
        if w == 0 || h == 0 {
            return Err(AssetError::EmptyImage(name));
        }
        zones.validate()?;

        let template = ScoringTemplate::new(ScoringMask::from_luma_resized(mask, w, h), zones);
        let alternate = alternate
            .filter(|img| img.width() > 0 && img.height() > 0)
            .map(|img| {
                let (aw, ah) = img.dimensions();
                ReferenceView::new(img, template.rescaled(aw, ah), registrar)
            });
        let primary = ReferenceView::new(canonical, template, registrar);
        log::info!(
            "reference '{name}': {w}x{h}, {} keypoints{}",
            primary.features.features().len(),
            if alternate.is_some() { ", with alternate" } else { "" }
        );
        Ok(Self {
            name,
            primary,
            alternate,
        })
    }

    /// Load the assets of `profile` from `layout`.
    ///
    /// The canonical image and the mask are required. An alternate image
    /// that is absent or unreadable is skipped.
    pub fn load(
        layout: &AssetLayout,
        profile: &TargetProfile,
        registrar: &Registrar,
    ) -> Result<Self, AssetError> {
        let name = profile.name.as_str();
        let canonical = open_image(&layout.canonical(name))?.to_rgb8();
        let mask = open_image(&layout.mask(name))?.to_luma8();
        let alt_path = layout.alternate(name);
        let alternate = if alt_path.exists() {
            match open_image(&alt_path) {
                Ok(img) => Some(img.to_rgb8()),
                Err(e) => {
                    log::warn!("ignoring alternate reference for '{name}': {e}");
                    None
                }
            }
        } else {
            None
        };
        Self::from_images(
            name,
            canonical,
            alternate,
            &mask,
            profile.zones.clone(),
            registrar,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary(&self) -> &ReferenceView {
        &self.primary
    }

    pub fn alternate(&self) -> Option<&ReferenceView> {
        self.alternate.as_ref()
    }
}

fn open_image(path: &Path) -> Result<image::DynamicImage, AssetError> {
    if !path.exists() {
        return Err(AssetError::Missing {
            path: path.to_path_buf(),
        });
    }
    image::open(path).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
