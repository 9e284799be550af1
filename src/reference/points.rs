//! Geo-tagged reference points placed on the floor plan.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::Calibration;
use crate::geometry::{ImagePoint, WorldPoint};
use crate::sensors::{ExternalEstimate, GeoSource, WifiScan};

/// A floor-plan location tagged with the external fix captured there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub id: String,
    pub world_x: f64,
    pub world_y: f64,
    pub image_u: f64,
    pub image_v: f64,
    #[serde(default)]
    pub geo_lat: Option<f64>,
    #[serde(default)]
    pub geo_lon: Option<f64>,
    #[serde(default)]
    pub geo_accuracy: Option<f64>,
    #[serde(default)]
    pub geo_source: Option<GeoSource>,
    #[serde(default)]
    pub wifi_fingerprint_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ReferencePoint {
    /// Reference point without any geo data.
    pub fn new(id: impl Into<String>, world: WorldPoint, image: ImagePoint) -> Self {
        Self {
            id: id.into(),
            world_x: world.x,
            world_y: world.y,
            image_u: image.u,
            image_v: image.v,
            geo_lat: None,
            geo_lon: None,
            geo_accuracy: None,
            geo_source: None,
            wifi_fingerprint_id: None,
            name: None,
        }
    }

    /// Build a reference point from a tap on the floor plan.
    ///
    /// World coordinates come from the calibration. Geo fields are copied from
    /// the fix captured at the same moment, if any.
    pub fn capture(
        image: ImagePoint,
        calibration: &Calibration,
        estimate: Option<&ExternalEstimate>,
        wifi_scan: Option<&WifiScan>,
    ) -> Self {
        let world = calibration.image_to_world(image.u, image.v);
        let mut point = Self::new(generate_id(), world, image);

        if let Some(estimate) = estimate {
            point.geo_lat = Some(estimate.lat);
            point.geo_lon = Some(estimate.lon);
            point.geo_accuracy = Some(estimate.accuracy);
            point.geo_source = Some(estimate.source);
        }
        if wifi_scan.is_some() {
            point.wifi_fingerprint_id = Some(format!("wifi_{}", Uuid::new_v4().simple()));
        }

        point
    }

    /// Attach a geographic fix.
    pub fn with_geo(mut self, lat: f64, lon: f64) -> Self {
        self.geo_lat = Some(lat);
        self.geo_lon = Some(lon);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stored world position.
    pub fn world(&self) -> WorldPoint {
        WorldPoint::new(self.world_x, self.world_y)
    }

    /// Stored image position.
    pub fn image(&self) -> ImagePoint {
        ImagePoint::new(self.image_u, self.image_v)
    }

    /// Latitude and longitude, if both are set.
    pub fn geo(&self) -> Option<(f64, f64)> {
        self.geo_lat.zip(self.geo_lon)
    }

    /// Display label: the name, falling back to the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Generate an identifier for a new reference point.
pub fn generate_id() -> String {
    format!("ref_{}", Uuid::new_v4().simple())
}

/// Ordered collection of reference points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencePointSet {
    points: Vec<ReferencePoint>,
}

impl ReferencePointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point. Insertion order is kept for nearest-match ties.
    pub fn add(&mut self, point: ReferencePoint) {
        self.points.push(point);
    }

    /// Remove a point by id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<ReferencePoint> {
        let index = self.points.iter().position(|p| p.id == id)?;
        Some(self.points.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&ReferencePoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferencePoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[ReferencePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
