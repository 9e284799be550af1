//! Image-space points, world-space points and the agent pose.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// A point in floor-plan image space (pixels).
///
/// Origin is the top-left corner of the image, `v` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePoint {
    pub u: f64,
    pub v: f64,
}

impl ImagePoint {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    /// Euclidean distance to another image point, in pixels.
    pub fn distance_to(&self, other: &ImagePoint) -> f64 {
        (other.u - self.u).hypot(other.v - self.v)
    }
}

/// A point in world space (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Agent pose: world position in meters and heading in radians.
///
/// `theta` stays in `(-π, π]` as long as the pose is built through
/// [`Pose::new`] or mutated by the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    /// Create a pose with a normalized heading.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Pose at the world origin facing along +x.
    pub fn origin() -> Self {
        Self::default()
    }

    /// Position part of the pose.
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }
}

/// Wrap an angle into `(-π, π]`.
///
/// Closed form, so arbitrarily large inputs cost the same as small ones.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut wrapped = angle % TAU;
    if wrapped > PI {
        wrapped -= TAU;
    } else if wrapped <= -PI {
        wrapped += TAU;
    }
    wrapped
}
