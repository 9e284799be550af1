//! Similarity transform between floor-plan pixels and world meters.
//!
//! A calibration is fully determined by a single two-point measurement: the
//! pixel distance between the taps divided by the real distance gives the
//! scale, and the direction of the tapped segment gives the rotation of the
//! world x-axis inside the image.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{ImagePoint, WorldPoint};

/// Calibration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Invalid calibration input: real distance must be a positive number, got {0}")]
    NonPositiveDistance(f64),
    #[error("Invalid calibration input: the two points are {0} pixels apart")]
    DegeneratePoints(f64),
    #[error("Invalid calibration input: scale {0} px/m is not usable")]
    UnusableScale(f64),
    #[error("Two-point measurement needs two taps, got {0}")]
    IncompleteMeasurement(usize),
}

/// Image ↔ world calibration.
///
/// Values are never mutated in place: re-anchoring returns a copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Pixels per meter (always > 0)
    pub scale: f64,
    /// Image-frame angle of the world x-axis, in radians
    pub rotation: f64,
    /// World X of the image anchor
    pub origin_world_x: f64,
    /// World Y of the image anchor
    pub origin_world_y: f64,
    /// Pixel U of the anchor
    pub origin_image_u: f64,
    /// Pixel V of the anchor
    pub origin_image_v: f64,
}

impl Calibration {
    /// Compute a calibration from two tapped image points and the real
    /// distance between them.
    ///
    /// The world origin is `(0, 0)` and sits at the `origin` image point,
    /// which does not have to be one of the tapped points.
    pub fn from_two_points(
        p1: ImagePoint,
        p2: ImagePoint,
        real_distance_m: f64,
        origin: ImagePoint,
    ) -> Result<Self, CalibrationError> {
        if !real_distance_m.is_finite() || real_distance_m <= 0.0 {
            return Err(CalibrationError::NonPositiveDistance(real_distance_m));
        }

        let du = p2.u - p1.u;
        let dv = p2.v - p1.v;
        let pixel_distance = du.hypot(dv);
        if !pixel_distance.is_finite() || pixel_distance <= 0.0 {
            return Err(CalibrationError::DegeneratePoints(pixel_distance));
        }

        let scale = pixel_distance / real_distance_m;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CalibrationError::UnusableScale(scale));
        }

        Ok(Self {
            scale,
            rotation: dv.atan2(du),
            origin_world_x: 0.0,
            origin_world_y: 0.0,
            origin_image_u: origin.u,
            origin_image_v: origin.v,
        })
    }

    /// Copy of this calibration anchored at a new image point.
    ///
    /// The new anchor becomes the world origin; scale and rotation are kept.
    pub fn with_origin(&self, origin: ImagePoint) -> Self {
        Self {
            origin_world_x: 0.0,
            origin_world_y: 0.0,
            origin_image_u: origin.u,
            origin_image_v: origin.v,
            ..*self
        }
    }

    /// Image anchor as a point.
    pub fn origin_image(&self) -> ImagePoint {
        ImagePoint::new(self.origin_image_u, self.origin_image_v)
    }

    /// Map world meters to image pixels.
    pub fn world_to_image(&self, x: f64, y: f64) -> ImagePoint {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let dx = x - self.origin_world_x;
        let dy = y - self.origin_world_y;

        let rotated_x = dx * cos_r - dy * sin_r;
        let rotated_y = dx * sin_r + dy * cos_r;

        ImagePoint::new(
            self.origin_image_u + rotated_x * self.scale,
            self.origin_image_v + rotated_y * self.scale,
        )
    }

    /// Map image pixels to world meters. Exact inverse of [`Self::world_to_image`].
    pub fn image_to_world(&self, u: f64, v: f64) -> WorldPoint {
        let scaled_x = (u - self.origin_image_u) / self.scale;
        let scaled_y = (v - self.origin_image_v) / self.scale;

        // rotate by -rotation
        let (sin_r, cos_r) = self.rotation.sin_cos();
        WorldPoint::new(
            self.origin_world_x + scaled_x * cos_r + scaled_y * sin_r,
            self.origin_world_y - scaled_x * sin_r + scaled_y * cos_r,
        )
    }
}

/// Compute a calibration from a two-point measurement.
pub fn compute_from_two_points(
    p1: ImagePoint,
    p2: ImagePoint,
    real_distance_m: f64,
    origin: ImagePoint,
) -> Result<Calibration, CalibrationError> {
    Calibration::from_two_points(p1, p2, real_distance_m, origin)
}

/// World → image through an optional calibration.
///
/// Returns `None` when no calibration exists yet; identity is never assumed.
pub fn world_to_image(x: f64, y: f64, calibration: Option<&Calibration>) -> Option<ImagePoint> {
    calibration.map(|cal| cal.world_to_image(x, y))
}

/// Image → world through an optional calibration.
pub fn image_to_world(u: f64, v: f64, calibration: Option<&Calibration>) -> Option<WorldPoint> {
    calibration.map(|cal| cal.image_to_world(u, v))
}
