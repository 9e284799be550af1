// Copyright 2025 ModerRAS
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Floorplan Tracker
//!
//! Position and heading tracking on a floor-plan image.
//!
//! A two-point measurement calibrates the image against world meters. The
//! agent's pose is then dead-reckoned from step/turn commands and pulled back
//! toward periodic GPS, Wi-Fi or cell fixes, which are resolved to world
//! coordinates through geo-tagged reference points placed on the plan.
//!
//! ## Core example
//!
//! ```rust
//! use floorplan_tracker::{
//!     compute_correction, Calibration, CorrectionMode, ExternalEstimate, GeoSource,
//!     ImagePoint, PoseIntegrator, ReferencePoint, WorldPoint,
//! };
//!
//! let calibration = Calibration::from_two_points(
//!     ImagePoint::new(0.0, 0.0),
//!     ImagePoint::new(200.0, 0.0),
//!     20.0,
//!     ImagePoint::new(0.0, 0.0),
//! )
//! .unwrap();
//!
//! let mut integrator = PoseIntegrator::default();
//! let pose = integrator.step_forward(5.0);
//! assert_eq!(calibration.world_to_image(pose.x, pose.y), ImagePoint::new(50.0, 0.0));
//!
//! let door = ReferencePoint::new("door", WorldPoint::new(8.0, 0.0), ImagePoint::new(80.0, 0.0))
//!     .with_geo(52.5200, 13.4050);
//! let fix = ExternalEstimate::new(52.5200, 13.4050, 30.0, GeoSource::Cell);
//!
//! let correction = compute_correction(
//!     &pose,
//!     &fix,
//!     &[door],
//!     Some(&calibration),
//!     CorrectionMode::GpsWifi,
//! )
//! .unwrap();
//! integrator.apply_correction(correction.x, correction.y);
//! assert!((integrator.pose().x - 6.5).abs() < 1e-9);
//! ```
//!
//! ## Correction loop example
//!
//! ```rust,no_run
//! use floorplan_tracker::{
//!     CorrectionLoopConfig, CorrectionLoopRunner, MotionCommand, ScriptedSource,
//!     TrackerCommand, TrackerSession,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = ScriptedSource::load("fixes.jsonl").map_err(anyhow::Error::msg)?;
//!     let handle = CorrectionLoopRunner::new(
//!         TrackerSession::new(),
//!         source,
//!         CorrectionLoopConfig::default(),
//!     )
//!     .with_event_callback(|event| {
//!         if let Some(pose) = event.pose() {
//!             println!("pose: ({:.2}, {:.2})", pose.x, pose.y);
//!         }
//!     })
//!     .run()
//!     .await;
//!
//!     handle.request(TrackerCommand::Move(MotionCommand::Forward(1.0))).await?;
//!     handle.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod calibration;
pub mod dead_reckoning;
pub mod fusion;
pub mod geometry;
pub mod reference;
pub mod sensors;
pub mod settings;
pub mod tracker;

pub use calibration::{Calibration, CalibrationError, TapOutcome, TwoPointCalibrator};
pub use dead_reckoning::{MotionCommand, PoseIntegrator};
pub use fusion::{compute_correction, Correction, CorrectionMode};
pub use geometry::{normalize_angle, ImagePoint, Pose, WorldPoint};
pub use reference::{
    external_estimate_to_world, find_nearest_by_geo, generate_id, haversine_distance,
    ReferencePoint, ReferencePointSet,
};
pub use sensors::{
    ExternalEstimate, GeoSource, NoFixSource, PositionSource, ScriptedSource, WifiScan,
};
pub use settings::TrackerSettings;
pub use tracker::{
    CorrectionLoopConfig, CorrectionLoopHandle, CorrectionLoopRunner, LoopError, PathHistory,
    TrackerCommand, TrackerError, TrackerEvent, TrackerSession, TrackerSnapshot,
};
