//! Shared settings for the tracker CLI and embedding shells.
//! Persisted in the platform-specific config directory via `directories::ProjectDirs`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::fusion::CorrectionMode;
use crate::tracker::DEFAULT_CORRECTION_INTERVAL_MS;

/// Tracker settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Distance of one forward step, in meters
    pub step_length_m: f64,
    /// Angle of one turn, in degrees
    pub turn_angle_deg: f64,
    /// Interval between automatic corrections, in milliseconds
    pub correction_interval_ms: u64,
    /// Which fixes may correct the pose
    pub correction_mode: CorrectionMode,
    /// JSON Lines file replayed as the position source (empty = no source)
    pub sensor_replay_path: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            step_length_m: 1.0,
            turn_angle_deg: 10.0,
            correction_interval_ms: DEFAULT_CORRECTION_INTERVAL_MS,
            correction_mode: CorrectionMode::GpsWifi,
            sensor_replay_path: String::new(),
        }
    }
}

impl TrackerSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "floorplan", "floorplan-tracker")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        let mut loaded: Self = Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        loaded.sanitize();
        loaded
    }

    /// Override fields from environment variables.
    ///
    /// Recognized: `STEP_LENGTH_M`, `TURN_ANGLE_DEG`, `CORRECTION_INTERVAL_MS`,
    /// `CORRECTION_MODE`, `SENSOR_REPLAY_PATH`. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(step) = env::var("STEP_LENGTH_M").ok().and_then(|s| s.parse().ok()) {
            self.step_length_m = step;
        }
        if let Some(angle) = env::var("TURN_ANGLE_DEG").ok().and_then(|s| s.parse().ok()) {
            self.turn_angle_deg = angle;
        }
        if let Some(ms) = env::var("CORRECTION_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.correction_interval_ms = ms;
        }
        if let Some(mode) = env::var("CORRECTION_MODE").ok().and_then(|s| s.parse().ok()) {
            self.correction_mode = mode;
        }
        if let Ok(path) = env::var("SENSOR_REPLAY_PATH") {
            self.sensor_replay_path = path;
        }
        self.sanitize();
        self
    }

    /// Turn angle in radians.
    pub fn turn_angle_rad(&self) -> f64 {
        self.turn_angle_deg.to_radians()
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir().ok_or("Cannot determine config directory")?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("settings.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&path, content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    // Backfill values an older or hand-edited file may leave unusable.
    fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.step_length_m.is_finite() || self.step_length_m <= 0.0 {
            self.step_length_m = defaults.step_length_m;
        }
        if !self.turn_angle_deg.is_finite() || self.turn_angle_deg <= 0.0 {
            self.turn_angle_deg = defaults.turn_angle_deg;
        }
        if self.correction_interval_ms == 0 {
            self.correction_interval_ms = defaults.correction_interval_ms;
        }
    }
}
