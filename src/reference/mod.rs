//! Geo-referenced anchor points and the nearest-match index over them.

mod geo;
mod points;

pub use geo::{external_estimate_to_world, find_nearest_by_geo, haversine_distance, EARTH_RADIUS_M};
pub use points::{generate_id, ReferencePoint, ReferencePointSet};
