//! Point and pose types shared by every positioning component.

mod types;

pub use types::{normalize_angle, ImagePoint, Pose, WorldPoint};
