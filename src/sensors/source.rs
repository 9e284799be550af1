//! Sources of external position fixes.
//!
//! How and when a fix is acquired (timeouts, cached positions, permissions)
//! is entirely up to the implementation. An absent fix is a normal result.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use super::estimate::{ExternalEstimate, WifiScan};

/// Something that can be polled for absolute position fixes.
pub trait PositionSource: Send {
    /// Read the current fix, or `None` when no fix is available.
    fn read_estimate(&mut self) -> Option<ExternalEstimate>;

    /// Capture a Wi-Fi scan for fingerprinting a reference point.
    fn capture_wifi_scan(&mut self) -> Option<WifiScan> {
        None
    }
}

impl<S: PositionSource + ?Sized> PositionSource for Box<S> {
    fn read_estimate(&mut self) -> Option<ExternalEstimate> {
        (**self).read_estimate()
    }

    fn capture_wifi_scan(&mut self) -> Option<WifiScan> {
        (**self).capture_wifi_scan()
    }
}

/// A source that never produces a fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFixSource;

impl PositionSource for NoFixSource {
    fn read_estimate(&mut self) -> Option<ExternalEstimate> {
        None
    }
}

/// Replays a fixed sequence of fixes, one per poll.
///
/// Once the script is exhausted every poll yields `None`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    estimates: VecDeque<Option<ExternalEstimate>>,
    wifi_scan: Option<WifiScan>,
}

impl ScriptedSource {
    pub fn new(estimates: impl IntoIterator<Item = Option<ExternalEstimate>>) -> Self {
        Self {
            estimates: estimates.into_iter().collect(),
            wifi_scan: None,
        }
    }

    /// Scan returned by every [`PositionSource::capture_wifi_scan`] call.
    pub fn with_wifi_scan(mut self, scan: WifiScan) -> Self {
        self.wifi_scan = Some(scan);
        self
    }

    /// Parse a JSON Lines script: one estimate object or `null` per line.
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_json_lines(content: &str) -> Result<Self, String> {
        let mut estimates = VecDeque::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let estimate: Option<ExternalEstimate> = serde_json::from_str(line)
                .map_err(|e| format!("Invalid estimate on line {}: {}", index + 1, e))?;
            estimates.push_back(estimate);
        }
        Ok(Self {
            estimates,
            wifi_scan: None,
        })
    }

    /// Load a JSON Lines script from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json_lines(&content)
    }

    /// Queue another poll result.
    pub fn push(&mut self, estimate: Option<ExternalEstimate>) {
        self.estimates.push_back(estimate);
    }

    /// Number of poll results left.
    pub fn remaining(&self) -> usize {
        self.estimates.len()
    }
}

impl PositionSource for ScriptedSource {
    fn read_estimate(&mut self) -> Option<ExternalEstimate> {
        self.estimates.pop_front().flatten()
    }

    fn capture_wifi_scan(&mut self) -> Option<WifiScan> {
        self.wifi_scan.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::GeoSource;

    #[test]
    fn test_no_fix_source() {
        let mut source = NoFixSource;
        assert!(source.read_estimate().is_none());
        assert!(source.capture_wifi_scan().is_none());
    }

    #[test]
    fn test_scripted_source_replays_in_order() {
        let mut source = ScriptedSource::new(vec![
            Some(ExternalEstimate::new(1.0, 2.0, 5.0, GeoSource::Gps)),
            None,
            Some(ExternalEstimate::new(3.0, 4.0, 30.0, GeoSource::Wifi)),
        ]);
        assert_eq!(source.read_estimate().unwrap().lat, 1.0);
        assert!(source.read_estimate().is_none());
        assert_eq!(source.read_estimate().unwrap().source, GeoSource::Wifi);
        assert!(source.read_estimate().is_none());
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_scripted_source_from_json_lines() {
        let script = r#"
# warm-up fix
{"lat": 48.1, "lon": 11.5, "accuracy": 8.0, "source": "gps"}
null

{"lat": 48.2, "lon": 11.6, "accuracy": 40.0, "source": "wifi", "world_x": 3.0, "world_y": 4.0}
"#;
        let mut source = ScriptedSource::from_json_lines(script).unwrap();
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.read_estimate().unwrap().source, GeoSource::Gps);
        assert!(source.read_estimate().is_none());
        assert_eq!(source.read_estimate().unwrap().world(), Some((3.0, 4.0)));
    }

    #[test]
    fn test_scripted_source_rejects_bad_line() {
        let result = ScriptedSource::from_json_lines("{\"lat\": 1.0}\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("line 1"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("fixes_{}.jsonl", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "{\"lat\": 1.0, \"lon\": 2.0, \"accuracy\": 150.0, \"source\": \"cell\"}\nnull\n",
        )
        .unwrap();

        let loaded = ScriptedSource::load(&path);
        fs::remove_file(&path).unwrap();

        let mut source = loaded.unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.read_estimate().unwrap().source, GeoSource::Cell);
        assert!(source.read_estimate().is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("missing_{}.jsonl", uuid::Uuid::new_v4()));
        let err = ScriptedSource::load(&path).unwrap_err();
        assert!(err.contains("Failed to read"));
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut source: Box<dyn PositionSource> = Box::new(ScriptedSource::new(vec![Some(
            ExternalEstimate::new(1.0, 2.0, 5.0, GeoSource::Gps),
        )]));
        assert_eq!(source.read_estimate().unwrap().lon, 2.0);
        assert!(source.read_estimate().is_none());
    }
}
