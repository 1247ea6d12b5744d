//! Points tagged with the coordinate space they live in.
//!
//! A shot position passes through three spaces: the camera frame, the crop
//! cut out of the frame around the detected target, and the canonical
//! reference image of that target. Mixing them up silently produces wrong
//! scores, so every point carries a zero-sized tag and conversions between
//! spaces are explicit functions.

use std::fmt;
use std::marker::PhantomData;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::Homography;

/// Marker trait for coordinate-space tags.
pub trait CoordinateSpace: Copy + Clone + fmt::Debug + Default + PartialEq + 'static {
    const NAME: &'static str;
}

/// Full camera frame pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame;

/// Pixels of a crop cut out of the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Crop;

/// Pixels of a canonical reference image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reference;

impl CoordinateSpace for Frame {
    const NAME: &'static str = "frame";
}

impl CoordinateSpace for Crop {
    const NAME: &'static str = "crop";
}

impl CoordinateSpace for Reference {
    const NAME: &'static str = "reference";
}

/// A 2D point in the coordinate space `S`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SpacePoint<S: CoordinateSpace> {
    pub x: f32,
    pub y: f32,
    #[serde(skip)]
    space: PhantomData<S>,
}

pub type FramePoint = SpacePoint<Frame>;
pub type CropPoint = SpacePoint<Crop>;
pub type ReferencePoint = SpacePoint<Reference>;

impl<S: CoordinateSpace> SpacePoint<S> {
    pub const fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    pub fn from_point2(p: Point2<f32>) -> Self {
        Self::new(p.x, p.y)
    }

    pub fn to_point2(self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    /// Integer pixel containing this point (coordinates are floored).
    pub fn pixel(self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }

    /// Pixel inside a `width x height` image, or `None` when out of bounds.
    pub fn pixel_within(self, width: u32, height: u32) -> Option<(u32, u32)> {
        let (x, y) = self.pixel();
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return None;
        }
        Some((x as u32, y as u32))
    }

    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl<S: CoordinateSpace> fmt::Debug for SpacePoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", S::NAME, self.x, self.y)
    }
}

/// Integer top-left corner of a crop inside the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelOrigin {
    pub x: u32,
    pub y: u32,
}

impl SpacePoint<Frame> {
    /// Express this frame point relative to a crop whose top-left is `origin`.
    pub fn relative_to(self, origin: PixelOrigin) -> CropPoint {
        CropPoint::new(self.x - origin.x as f32, self.y - origin.y as f32)
    }
}

impl SpacePoint<Crop> {
    /// Inverse of [`FramePoint::relative_to`].
    pub fn in_frame(self, origin: PixelOrigin) -> FramePoint {
        FramePoint::new(self.x + origin.x as f32, self.y + origin.y as f32)
    }

    /// Axis-aligned linear scaling into reference space.
    ///
    /// Only an approximation: it ignores perspective, rotation and the crop's
    /// margin around the target.
    pub fn scaled_to_reference(self, sx: f32, sy: f32) -> ReferencePoint {
        ReferencePoint::new(self.x * sx, self.y * sy)
    }
}

/// A homography that maps points of space `Src` into space `Dst`.
#[derive(Clone, Copy, PartialEq)]
pub struct SpaceTransform<Src: CoordinateSpace, Dst: CoordinateSpace> {
    homography: Homography,
    spaces: PhantomData<(Src, Dst)>,
}

impl<Src: CoordinateSpace, Dst: CoordinateSpace> SpaceTransform<Src, Dst> {
    pub fn new(homography: Homography) -> Self {
        Self {
            homography,
            spaces: PhantomData,
        }
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    pub fn apply(&self, p: SpacePoint<Src>) -> SpacePoint<Dst> {
        SpacePoint::from_point2(self.homography.apply(p.to_point2()))
    }

    pub fn inverse(&self) -> Option<SpaceTransform<Dst, Src>> {
        self.homography.inverse().map(SpaceTransform::new)
    }
}

impl<Src: CoordinateSpace, Dst: CoordinateSpace> fmt::Debug for SpaceTransform<Src, Dst> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceTransform")
            .field("from", &Src::NAME)
            .field("to", &Dst::NAME)
            .field("h", &self.homography.to_array())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    #[test]
    fn crop_round_trip_is_exact() {
        let aim = FramePoint::new(412.0, 233.0);
        let origin = PixelOrigin { x: 300, y: 120 };
        let local = aim.relative_to(origin);
        assert_eq!(local, CropPoint::new(112.0, 113.0));
        assert_eq!(local.in_frame(origin), aim);
    }

    #[test]
    fn pixel_floors_negative_fractions_out_of_bounds() {
        assert_eq!(ReferencePoint::new(-0.5, 3.9).pixel(), (-1, 3));
        assert!(ReferencePoint::new(-0.5, 3.9).pixel_within(10, 10).is_none());
        assert_eq!(
            ReferencePoint::new(9.99, 0.0).pixel_within(10, 10),
            Some((9, 0))
        );
        assert!(ReferencePoint::new(10.0, 0.0).pixel_within(10, 10).is_none());
    }

    #[test]
    fn typed_transform_maps_and_inverts() {
        let h = Homography::new(Matrix3::new(
            2.0, 0.0, 10.0, //
            0.0, 2.0, -4.0, //
            0.0, 0.0, 1.0,
        ));
        let t: SpaceTransform<Crop, Reference> = SpaceTransform::new(h);
        let r = t.apply(CropPoint::new(5.0, 7.0));
        assert_relative_eq!(r.x, 20.0, epsilon = 1e-5);
        assert_relative_eq!(r.y, 10.0, epsilon = 1e-5);

        let back = t.inverse().expect("invertible").apply(r);
        assert_relative_eq!(back.x, 5.0, epsilon = 1e-4);
        assert_relative_eq!(back.y, 7.0, epsilon = 1e-4);
    }

    #[test]
    fn points_serialize_without_space_tag() {
        let p = ReferencePoint::new(1.5, 2.0);
        let json = serde_json::to_string(&p).expect("serialize");
        assert_eq!(json, r#"{"x":1.5,"y":2.0}"#);
        let back: ReferencePoint = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, p);
    }
}
