//! Drift correction: blend the dead-reckoned position toward an external fix.
//!
//! Each correction is computed from its inputs alone. There is no covariance
//! or history, so a single noisy fix can only move the pose part of the way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::geometry::Pose;
use crate::reference::{external_estimate_to_world, ReferencePoint};
use crate::sensors::{ExternalEstimate, GeoSource};

/// Blend factor for fixes more accurate than 10 m.
pub const ALPHA_HIGH_CONFIDENCE: f64 = 0.7;
/// Blend factor for fixes between 10 m and 50 m.
pub const ALPHA_MEDIUM_CONFIDENCE: f64 = 0.5;
/// Blend factor for anything coarser.
pub const ALPHA_LOW_CONFIDENCE: f64 = 0.2;

/// Which external fixes may correct the pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionMode {
    /// Any source corrects the pose.
    #[default]
    GpsWifi,
    /// Only Wi-Fi fixes correct the pose.
    WifiOnly,
    /// Automatic correction disabled.
    ManualOnly,
}

impl CorrectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionMode::GpsWifi => "gps-wifi",
            CorrectionMode::WifiOnly => "wifi-only",
            CorrectionMode::ManualOnly => "manual-only",
        }
    }

    /// Whether fixes from `source` pass this mode's gate.
    pub fn accepts(&self, source: GeoSource) -> bool {
        match self {
            CorrectionMode::GpsWifi => true,
            CorrectionMode::WifiOnly => source == GeoSource::Wifi,
            CorrectionMode::ManualOnly => false,
        }
    }
}

impl fmt::Display for CorrectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gps-wifi" | "auto" => Ok(CorrectionMode::GpsWifi),
            "wifi-only" | "wifi" => Ok(CorrectionMode::WifiOnly),
            "manual-only" | "manual" => Ok(CorrectionMode::ManualOnly),
            other => Err(format!("Unknown correction mode: {}", other)),
        }
    }
}

/// A corrected position and the blend factor that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub x: f64,
    pub y: f64,
    pub alpha: f64,
}

/// Blend factor for a fix of the given accuracy and source, in `[0, 1]`.
pub fn blend_factor(accuracy_m: f64, source: GeoSource) -> f64 {
    let base = if accuracy_m < 10.0 {
        ALPHA_HIGH_CONFIDENCE
    } else if accuracy_m < 50.0 {
        ALPHA_MEDIUM_CONFIDENCE
    } else {
        ALPHA_LOW_CONFIDENCE
    };

    let multiplier = match source {
        GeoSource::Gps => 1.2,
        GeoSource::Wifi => 1.1,
        GeoSource::Cell | GeoSource::Mixed => 1.0,
    };

    (base * multiplier).clamp(0.0, 1.0)
}

/// Compute a drift correction for `current` from an external fix.
///
/// Returns `None` when the mode rejects the fix or the fix cannot be
/// resolved to world coordinates.
pub fn compute_correction(
    current: &Pose,
    estimate: &ExternalEstimate,
    references: &[ReferencePoint],
    calibration: Option<&Calibration>,
    mode: CorrectionMode,
) -> Option<Correction> {
    if !mode.accepts(estimate.source) {
        return None;
    }

    let target = external_estimate_to_world(estimate, references, calibration)?;

    let delta_x = target.x - current.x;
    let delta_y = target.y - current.y;
    let alpha = blend_factor(estimate.accuracy, estimate.source);

    Some(Correction {
        x: current.x + alpha * delta_x,
        y: current.y + alpha * delta_y,
        alpha,
    })
}
