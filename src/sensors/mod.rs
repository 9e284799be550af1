//! External sensor data: position fixes, Wi-Fi scans and their sources.

mod estimate;
mod source;

pub use estimate::{infer_source, AccessPoint, ExternalEstimate, GeoSource, WifiScan};
pub use source::{NoFixSource, PositionSource, ScriptedSource};
