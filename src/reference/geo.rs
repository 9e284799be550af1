//! Nearest-reference lookup by geographic distance.

use crate::calibration::Calibration;
use crate::geometry::WorldPoint;
use crate::sensors::ExternalEstimate;

use super::points::ReferencePoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two lat/lon pairs given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = ((d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Find the reference point geographically closest to `(lat, lon)`.
///
/// Points without both latitude and longitude are skipped. On equal
/// distances the first point in `points` wins.
pub fn find_nearest_by_geo(lat: f64, lon: f64, points: &[ReferencePoint]) -> Option<&ReferencePoint> {
    let mut nearest: Option<(&ReferencePoint, f64)> = None;

    for point in points {
        let Some((geo_lat, geo_lon)) = point.geo() else {
            continue;
        };
        let distance = haversine_distance(lat, lon, geo_lat, geo_lon);
        let closer = match nearest {
            Some((_, best)) => distance < best,
            None => !distance.is_nan(),
        };
        if closer {
            nearest = Some((point, distance));
        }
    }

    nearest.map(|(point, _)| point)
}

/// Resolve an external fix to world coordinates.
///
/// World coordinates carried by the fix are used as-is. Otherwise the fix
/// snaps to the stored world position of the nearest geo-tagged reference,
/// which requires a calibration to exist.
pub fn external_estimate_to_world(
    estimate: &ExternalEstimate,
    points: &[ReferencePoint],
    calibration: Option<&Calibration>,
) -> Option<WorldPoint> {
    if let Some((x, y)) = estimate.world() {
        return Some(WorldPoint::new(x, y));
    }

    if calibration.is_none() {
        return None;
    }

    find_nearest_by_geo(estimate.lat, estimate.lon, points).map(ReferencePoint::world)
}
