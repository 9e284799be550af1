//! External position fixes and Wi-Fi scans.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of an external position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoSource {
    Gps,
    Cell,
    Wifi,
    Mixed,
}

impl GeoSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoSource::Gps => "gps",
            GeoSource::Cell => "cell",
            GeoSource::Wifi => "wifi",
            GeoSource::Mixed => "mixed",
        }
    }
}

impl fmt::Display for GeoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gps" => Ok(GeoSource::Gps),
            "cell" => Ok(GeoSource::Cell),
            "wifi" | "wi-fi" => Ok(GeoSource::Wifi),
            "mixed" => Ok(GeoSource::Mixed),
            other => Err(format!("Unknown geo source: {}", other)),
        }
    }
}

/// Guess the fix source from its reported accuracy.
///
/// This is a rough heuristic with no ground truth behind it: below 10 m is
/// taken as GPS, below 100 m as a mix of providers, anything coarser as cell.
pub fn infer_source(accuracy_m: f64) -> GeoSource {
    if accuracy_m < 10.0 {
        GeoSource::Gps
    } else if accuracy_m < 100.0 {
        GeoSource::Mixed
    } else {
        GeoSource::Cell
    }
}

/// A single absolute position fix from an external sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEstimate {
    pub lat: f64,
    pub lon: f64,
    /// Accuracy radius in meters (smaller is more confident)
    pub accuracy: f64,
    pub source: GeoSource,
    /// World X, when the provider already resolved the fix to world space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_x: Option<f64>,
    /// World Y, when the provider already resolved the fix to world space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_y: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ExternalEstimate {
    /// Create a geographic fix stamped with the current time.
    pub fn new(lat: f64, lon: f64, accuracy: f64, source: GeoSource) -> Self {
        Self {
            lat,
            lon,
            accuracy,
            source,
            world_x: None,
            world_y: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a geographic fix whose source is inferred from the accuracy.
    pub fn with_inferred_source(lat: f64, lon: f64, accuracy: f64) -> Self {
        Self::new(lat, lon, accuracy, infer_source(accuracy))
    }

    /// Attach world coordinates resolved by the provider.
    pub fn with_world(mut self, x: f64, y: f64) -> Self {
        self.world_x = Some(x);
        self.world_y = Some(y);
        self
    }

    /// World coordinates, if both are present.
    pub fn world(&self) -> Option<(f64, f64)> {
        self.world_x.zip(self.world_y)
    }
}

/// One access point seen in a Wi-Fi scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub bssid: String,
    pub rssi: i32,
}

/// A Wi-Fi scan captured alongside a reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiScan {
    pub bssids: Vec<AccessPoint>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl WifiScan {
    pub fn new(bssids: Vec<AccessPoint>) -> Self {
        Self {
            bssids,
            timestamp: Utc::now(),
        }
    }

    /// Strongest access point in the scan.
    pub fn strongest(&self) -> Option<&AccessPoint> {
        self.bssids.iter().max_by_key(|ap| ap.rssi)
    }
}
