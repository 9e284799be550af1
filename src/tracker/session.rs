//! Tracker session: the single owner of mutable tracking state.
//!
//! A session applies [`TrackerCommand`]s and reports what changed as a
//! [`TrackerEvent`]. It keeps no listeners; whoever drives it decides how to
//! publish events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calibration::{Calibration, CalibrationError, TapOutcome, TwoPointCalibrator};
use crate::dead_reckoning::{MotionCommand, PoseIntegrator};
use crate::fusion::{compute_correction, Correction, CorrectionMode};
use crate::geometry::{ImagePoint, Pose};
use crate::reference::{ReferencePoint, ReferencePointSet};
use crate::sensors::{ExternalEstimate, WifiScan};

use super::path::PathHistory;

/// Tracker session errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("No calibration: perform a two-point calibration first")]
    MissingCalibration,
    #[error("Unknown reference point: {0}")]
    UnknownReference(String),
    #[error("Invalid floor plan size: {0}x{1}")]
    InvalidFloorPlan(u32, u32),
}

/// Floor-plan image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorPlan {
    pub width: u32,
    pub height: u32,
}

/// Commands accepted by a tracker session.
#[derive(Debug, Clone)]
pub enum TrackerCommand {
    /// A new floor plan was loaded; the old calibration no longer applies.
    LoadFloorPlan { width: u32, height: u32 },
    /// Record one tap of a two-point measurement.
    CalibrationTap(ImagePoint),
    /// Finish the tapped measurement with the real distance between the taps.
    FinishCalibration { distance_m: f64 },
    /// Calibrate directly from two points; `p1` becomes the anchor.
    Calibrate {
        p1: ImagePoint,
        p2: ImagePoint,
        distance_m: f64,
    },
    /// Re-anchor the calibration at a start point and reset the pose there.
    SetStartPoint(ImagePoint),
    /// Place a reference point, tagged with the fix captured at that moment.
    AddReference {
        image: ImagePoint,
        estimate: Option<ExternalEstimate>,
        wifi_scan: Option<WifiScan>,
    },
    RemoveReference(String),
    /// Move the agent onto a reference point, heading reset to zero.
    SnapToReference(String),
    Move(MotionCommand),
    /// Offer an external fix for drift correction. `None` means no fix.
    ApplyEstimate(Option<ExternalEstimate>),
    SetMode(CorrectionMode),
    ResetPath,
}

/// What a command changed.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    FloorPlanLoaded(FloorPlan),
    CalibrationTap(TapOutcome),
    Calibrated(Calibration),
    StartPointSet { calibration: Calibration, pose: Pose },
    ReferenceAdded(ReferencePoint),
    ReferenceRemoved(ReferencePoint),
    PoseUpdated(Pose),
    Corrected { pose: Pose, correction: Correction },
    NoCorrection,
    ModeChanged(CorrectionMode),
    PathReset,
}

impl TrackerEvent {
    /// New pose, for events that moved the agent.
    pub fn pose(&self) -> Option<Pose> {
        match self {
            TrackerEvent::StartPointSet { pose, .. }
            | TrackerEvent::PoseUpdated(pose)
            | TrackerEvent::Corrected { pose, .. } => Some(*pose),
            _ => None,
        }
    }
}

/// Read-only copy of the session state.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub floor_plan: Option<FloorPlan>,
    pub calibration: Option<Calibration>,
    pub references: Vec<ReferencePoint>,
    pub pose: Pose,
    pub path: PathHistory,
    pub mode: CorrectionMode,
}

/// Owns calibration, reference points, the integrator and the path.
#[derive(Debug, Clone, Default)]
pub struct TrackerSession {
    floor_plan: Option<FloorPlan>,
    calibration: Option<Calibration>,
    calibrator: TwoPointCalibrator,
    references: ReferencePointSet,
    integrator: PoseIntegrator,
    path: PathHistory,
    mode: CorrectionMode,
}

impl TrackerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: CorrectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn floor_plan(&self) -> Option<FloorPlan> {
        self.floor_plan
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn references(&self) -> &ReferencePointSet {
        &self.references
    }

    pub fn pose(&self) -> Pose {
        self.integrator.pose()
    }

    pub fn path(&self) -> &PathHistory {
        &self.path
    }

    pub fn mode(&self) -> CorrectionMode {
        self.mode
    }

    /// Whether the correction loop should poll the sensor at all.
    pub fn wants_fix(&self) -> bool {
        self.calibration.is_some() && self.mode != CorrectionMode::ManualOnly
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            floor_plan: self.floor_plan,
            calibration: self.calibration,
            references: self.references.as_slice().to_vec(),
            pose: self.pose(),
            path: self.path.clone(),
            mode: self.mode,
        }
    }

    /// Apply a command.
    pub fn handle(&mut self, command: TrackerCommand) -> Result<TrackerEvent, TrackerError> {
        match command {
            TrackerCommand::LoadFloorPlan { width, height } => self.load_floor_plan(width, height),
            TrackerCommand::CalibrationTap(point) => {
                Ok(TrackerEvent::CalibrationTap(self.calibrator.tap(point)))
            }
            TrackerCommand::FinishCalibration { distance_m } => {
                let calibration = self.calibrator.finish(distance_m)?;
                Ok(self.set_calibration(calibration))
            }
            TrackerCommand::Calibrate { p1, p2, distance_m } => {
                let calibration = Calibration::from_two_points(p1, p2, distance_m, p1)?;
                Ok(self.set_calibration(calibration))
            }
            TrackerCommand::SetStartPoint(point) => self.set_start_point(point),
            TrackerCommand::AddReference {
                image,
                estimate,
                wifi_scan,
            } => self.add_reference(image, estimate.as_ref(), wifi_scan.as_ref()),
            TrackerCommand::RemoveReference(id) => self
                .references
                .remove(&id)
                .map(|removed| {
                    tracing::info!("Removed reference point {}", removed.id);
                    TrackerEvent::ReferenceRemoved(removed)
                })
                .ok_or(TrackerError::UnknownReference(id)),
            TrackerCommand::SnapToReference(id) => self.snap_to_reference(&id),
            TrackerCommand::Move(motion) => {
                let pose = self.integrator.apply(motion);
                self.path.record(&pose);
                Ok(TrackerEvent::PoseUpdated(pose))
            }
            TrackerCommand::ApplyEstimate(estimate) => Ok(self.apply_estimate(estimate.as_ref())),
            TrackerCommand::SetMode(mode) => {
                tracing::info!("Correction mode set to {}", mode);
                self.mode = mode;
                Ok(TrackerEvent::ModeChanged(mode))
            }
            TrackerCommand::ResetPath => {
                self.path.clear();
                Ok(TrackerEvent::PathReset)
            }
        }
    }

    fn load_floor_plan(&mut self, width: u32, height: u32) -> Result<TrackerEvent, TrackerError> {
        if width == 0 || height == 0 {
            return Err(TrackerError::InvalidFloorPlan(width, height));
        }
        let floor_plan = FloorPlan { width, height };
        self.floor_plan = Some(floor_plan);
        self.calibration = None;
        self.calibrator.cancel();
        tracing::info!("Loaded floor plan {}x{}, calibration cleared", width, height);
        Ok(TrackerEvent::FloorPlanLoaded(floor_plan))
    }

    fn set_calibration(&mut self, calibration: Calibration) -> TrackerEvent {
        tracing::info!(
            "Calibrated: {:.3} px/m, rotation {:.4} rad",
            calibration.scale,
            calibration.rotation
        );
        self.calibration = Some(calibration);
        TrackerEvent::Calibrated(calibration)
    }

    fn set_start_point(&mut self, point: ImagePoint) -> Result<TrackerEvent, TrackerError> {
        let calibration = self
            .calibration
            .as_ref()
            .ok_or(TrackerError::MissingCalibration)?
            .with_origin(point);
        self.calibration = Some(calibration);

        let pose = self.integrator.set_pose(Pose::origin());
        self.path.record(&pose);
        tracing::info!("Start point set at ({:.1}, {:.1})", point.u, point.v);
        Ok(TrackerEvent::StartPointSet { calibration, pose })
    }

    fn add_reference(
        &mut self,
        image: ImagePoint,
        estimate: Option<&ExternalEstimate>,
        wifi_scan: Option<&WifiScan>,
    ) -> Result<TrackerEvent, TrackerError> {
        let calibration = self
            .calibration
            .as_ref()
            .ok_or(TrackerError::MissingCalibration)?;

        let name = format!("Ref {}", self.references.len() + 1);
        let point = ReferencePoint::capture(image, calibration, estimate, wifi_scan).with_name(name);

        if point.geo().is_none() {
            tracing::warn!("Reference point {} has no geo fix and will never match", point.id);
        }
        tracing::info!(
            "Added reference point {} at world ({:.2}, {:.2})",
            point.id,
            point.world_x,
            point.world_y
        );
        self.references.add(point.clone());
        Ok(TrackerEvent::ReferenceAdded(point))
    }

    fn snap_to_reference(&mut self, id: &str) -> Result<TrackerEvent, TrackerError> {
        let target = self
            .references
            .get(id)
            .ok_or_else(|| TrackerError::UnknownReference(id.to_string()))?
            .world();
        let pose = self.integrator.set_pose(Pose::new(target.x, target.y, 0.0));
        self.path.record(&pose);
        Ok(TrackerEvent::PoseUpdated(pose))
    }

    fn apply_estimate(&mut self, estimate: Option<&ExternalEstimate>) -> TrackerEvent {
        let Some(estimate) = estimate else {
            tracing::debug!("No external fix this cycle");
            return TrackerEvent::NoCorrection;
        };
        if !self.wants_fix() {
            return TrackerEvent::NoCorrection;
        }

        let current = self.integrator.pose();
        let correction = compute_correction(
            &current,
            estimate,
            self.references.as_slice(),
            self.calibration.as_ref(),
            self.mode,
        );

        match correction {
            Some(correction) => {
                let pose = self.integrator.apply_correction(correction.x, correction.y);
                self.path.record(&pose);
                tracing::debug!(
                    "Drift correction from {} fix (±{:.0} m): alpha {:.2}, pose ({:.2}, {:.2})",
                    estimate.source,
                    estimate.accuracy,
                    correction.alpha,
                    pose.x,
                    pose.y
                );
                TrackerEvent::Corrected { pose, correction }
            }
            None => TrackerEvent::NoCorrection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::GeoSource;

    fn calibrated_session() -> TrackerSession {
        let mut session = TrackerSession::new();
        session
            .handle(TrackerCommand::Calibrate {
                p1: ImagePoint::new(0.0, 0.0),
                p2: ImagePoint::new(200.0, 0.0),
                distance_m: 20.0,
            })
            .unwrap();
        session
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut session = calibrated_session();
        let cal = *session.calibration().unwrap();
        assert_eq!(cal.scale, 10.0);
        assert_eq!(cal.rotation, 0.0);

        let event = session
            .handle(TrackerCommand::Move(MotionCommand::Forward(5.0)))
            .unwrap();
        assert_eq!(event.pose(), Some(Pose::new(5.0, 0.0, 0.0)));
        assert_eq!(cal.world_to_image(5.0, 0.0), ImagePoint::new(50.0, 0.0));
    }

    #[test]
    fn test_start_point_requires_calibration() {
        let mut session = TrackerSession::new();
        assert_eq!(
            session.handle(TrackerCommand::SetStartPoint(ImagePoint::new(1.0, 1.0))),
            Err(TrackerError::MissingCalibration)
        );
    }

    #[test]
    fn test_start_point_reanchors_and_resets_pose() {
        let mut session = calibrated_session();
        session
            .handle(TrackerCommand::Move(MotionCommand::Forward(3.0)))
            .unwrap();

        let event = session
            .handle(TrackerCommand::SetStartPoint(ImagePoint::new(120.0, 80.0)))
            .unwrap();
        match event {
            TrackerEvent::StartPointSet { calibration, pose } => {
                assert_eq!(calibration.scale, 10.0);
                assert_eq!(calibration.origin_image(), ImagePoint::new(120.0, 80.0));
                assert_eq!(pose, Pose::origin());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(session.pose(), Pose::origin());
    }

    #[test]
    fn test_tap_calibration_flow() {
        let mut session = TrackerSession::new();
        assert_eq!(
            session.handle(TrackerCommand::CalibrationTap(ImagePoint::new(0.0, 0.0))),
            Ok(TrackerEvent::CalibrationTap(TapOutcome::AwaitingSecondPoint))
        );
        assert_eq!(
            session.handle(TrackerCommand::CalibrationTap(ImagePoint::new(0.0, 50.0))),
            Ok(TrackerEvent::CalibrationTap(TapOutcome::AwaitingDistance))
        );
        let event = session
            .handle(TrackerCommand::FinishCalibration { distance_m: 5.0 })
            .unwrap();
        assert!(matches!(event, TrackerEvent::Calibrated(_)));
        assert_eq!(session.calibration().unwrap().scale, 10.0);
    }

    #[test]
    fn test_invalid_calibration_is_rejected() {
        let mut session = TrackerSession::new();
        let result = session.handle(TrackerCommand::Calibrate {
            p1: ImagePoint::new(4.0, 4.0),
            p2: ImagePoint::new(4.0, 4.0),
            distance_m: 1.0,
        });
        assert!(matches!(result, Err(TrackerError::Calibration(_))));
        assert!(session.calibration().is_none());
    }

    #[test]
    fn test_new_floor_plan_discards_calibration() {
        let mut session = calibrated_session();
        session
            .handle(TrackerCommand::LoadFloorPlan {
                width: 1024,
                height: 768,
            })
            .unwrap();
        assert!(session.calibration().is_none());
        assert_eq!(
            session.floor_plan(),
            Some(FloorPlan {
                width: 1024,
                height: 768
            })
        );
        assert_eq!(
            session.handle(TrackerCommand::LoadFloorPlan { width: 0, height: 5 }),
            Err(TrackerError::InvalidFloorPlan(0, 5))
        );
    }

    #[test]
    fn test_reference_lifecycle() {
        let mut session = TrackerSession::new();
        let add = TrackerCommand::AddReference {
            image: ImagePoint::new(100.0, 0.0),
            estimate: None,
            wifi_scan: None,
        };
        assert_eq!(
            session.handle(add.clone()),
            Err(TrackerError::MissingCalibration)
        );

        let mut session = calibrated_session();
        let event = session.handle(add).unwrap();
        let TrackerEvent::ReferenceAdded(point) = event else {
            panic!("expected ReferenceAdded");
        };
        assert_eq!(point.name.as_deref(), Some("Ref 1"));
        assert!((point.world_x - 10.0).abs() < 1e-12);

        session
            .handle(TrackerCommand::SnapToReference(point.id.clone()))
            .unwrap();
        assert!((session.pose().x - 10.0).abs() < 1e-12);
        assert_eq!(session.pose().theta, 0.0);

        session
            .handle(TrackerCommand::RemoveReference(point.id.clone()))
            .unwrap();
        assert!(session.references().is_empty());
        assert_eq!(
            session.handle(TrackerCommand::RemoveReference(point.id.clone())),
            Err(TrackerError::UnknownReference(point.id))
        );
    }

    #[test]
    fn test_estimate_corrects_position_only() {
        let mut session = calibrated_session();
        session
            .handle(TrackerCommand::AddReference {
                image: ImagePoint::new(100.0, 0.0),
                estimate: Some(ExternalEstimate::new(45.0, 7.0, 5.0, GeoSource::Gps)),
                wifi_scan: None,
            })
            .unwrap();
        session
            .handle(TrackerCommand::Move(MotionCommand::Left(0.3)))
            .unwrap();
        let theta = session.pose().theta;

        let event = session
            .handle(TrackerCommand::ApplyEstimate(Some(ExternalEstimate::new(
                45.0,
                7.0,
                30.0,
                GeoSource::Cell,
            ))))
            .unwrap();
        let TrackerEvent::Corrected { pose, correction } = event else {
            panic!("expected a correction");
        };
        assert!((correction.alpha - 0.5).abs() < 1e-12);
        assert!((pose.x - 5.0).abs() < 1e-12);
        assert_eq!(pose.theta.to_bits(), theta.to_bits());
    }

    #[test]
    fn test_no_fix_and_manual_mode_are_noops() {
        let mut session = calibrated_session();
        assert_eq!(
            session.handle(TrackerCommand::ApplyEstimate(None)),
            Ok(TrackerEvent::NoCorrection)
        );

        session
            .handle(TrackerCommand::SetMode(CorrectionMode::ManualOnly))
            .unwrap();
        assert!(!session.wants_fix());
        let estimate = ExternalEstimate::new(0.0, 0.0, 1.0, GeoSource::Gps).with_world(9.0, 9.0);
        assert_eq!(
            session.handle(TrackerCommand::ApplyEstimate(Some(estimate))),
            Ok(TrackerEvent::NoCorrection)
        );
        assert_eq!(session.pose(), Pose::origin());
    }

    #[test]
    fn test_path_grows_once_per_pose_update() {
        let mut session = calibrated_session();
        session
            .handle(TrackerCommand::Move(MotionCommand::Forward(1.0)))
            .unwrap();
        session
            .handle(TrackerCommand::Move(MotionCommand::Right(0.5)))
            .unwrap();
        let estimate = ExternalEstimate::new(0.0, 0.0, 1.0, GeoSource::Gps).with_world(4.0, 0.0);
        session
            .handle(TrackerCommand::ApplyEstimate(Some(estimate)))
            .unwrap();
        session
            .handle(TrackerCommand::ApplyEstimate(None))
            .unwrap();
        assert_eq!(session.path().len(), 3);

        session.handle(TrackerCommand::ResetPath).unwrap();
        assert!(session.path().is_empty());
    }
}
