//! Dead-reckoning pose integrator.

use serde::{Deserialize, Serialize};

use crate::geometry::{normalize_angle, Pose};

/// Relative motion command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionCommand {
    /// Step along the current heading, in meters (negative = backward).
    Forward(f64),
    /// Turn left by an angle in radians.
    Left(f64),
    /// Turn right by an angle in radians.
    Right(f64),
}

/// Integrates relative motion into a single pose.
///
/// No state is kept besides the pose. Every mutator returns the new pose so
/// the caller can record it.
#[derive(Debug, Clone, Default)]
pub struct PoseIntegrator {
    pose: Pose,
}

impl PoseIntegrator {
    /// Create an integrator starting at `initial`.
    pub fn new(initial: Pose) -> Self {
        Self {
            pose: Pose::new(initial.x, initial.y, initial.theta),
        }
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Move `distance` meters along the current heading.
    pub fn step_forward(&mut self, distance: f64) -> Pose {
        let (sin_t, cos_t) = self.pose.theta.sin_cos();
        self.pose.x += distance * cos_t;
        self.pose.y += distance * sin_t;
        self.pose
    }

    /// Turn left: heading decreases by `angle`.
    pub fn rotate_left(&mut self, angle: f64) -> Pose {
        self.pose.theta = normalize_angle(self.pose.theta - angle);
        self.pose
    }

    /// Turn right: heading increases by `angle`.
    pub fn rotate_right(&mut self, angle: f64) -> Pose {
        self.pose.theta = normalize_angle(self.pose.theta + angle);
        self.pose
    }

    /// Overwrite the whole pose.
    pub fn set_pose(&mut self, pose: Pose) -> Pose {
        self.pose = Pose::new(pose.x, pose.y, pose.theta);
        self.pose
    }

    /// Overwrite the position only. The heading is left untouched.
    pub fn apply_correction(&mut self, x: f64, y: f64) -> Pose {
        self.pose.x = x;
        self.pose.y = y;
        self.pose
    }

    /// Apply a motion command.
    pub fn apply(&mut self, command: MotionCommand) -> Pose {
        match command {
            MotionCommand::Forward(distance) => self.step_forward(distance),
            MotionCommand::Left(angle) => self.rotate_left(angle),
            MotionCommand::Right(angle) => self.rotate_right(angle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_step_forward_along_heading() {
        let mut integrator = PoseIntegrator::default();
        let pose = integrator.step_forward(5.0);
        assert_eq!(pose, Pose::new(5.0, 0.0, 0.0));

        integrator.rotate_right(PI / 2.0);
        let pose = integrator.step_forward(2.0);
        assert!((pose.x - 5.0).abs() < 1e-12);
        assert!((pose.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_step_moves_backward() {
        let mut integrator = PoseIntegrator::default();
        let pose = integrator.step_forward(-3.0);
        assert_eq!(pose.x, -3.0);
        assert_eq!(pose.y, 0.0);
    }

    #[test]
    fn test_rotate_left_three_pi_wraps() {
        let mut integrator = PoseIntegrator::default();
        let pose = integrator.rotate_left(3.0 * PI);
        assert!(pose.theta > -PI && pose.theta <= PI);
        assert!((pose.theta.abs() - PI).abs() < 1e-9);
    }

    #[test]
    fn test_rotations_stay_normalized() {
        let mut integrator = PoseIntegrator::default();
        for _ in 0..100 {
            let pose = integrator.rotate_right(PI / 18.0);
            assert!(pose.theta > -PI && pose.theta <= PI);
        }
        let pose = integrator.rotate_left(1.0e7);
        assert!(pose.theta > -PI && pose.theta <= PI);
    }

    #[test]
    fn test_set_pose_normalizes() {
        let mut integrator = PoseIntegrator::default();
        let pose = integrator.set_pose(Pose {
            x: 1.0,
            y: 2.0,
            theta: 5.0 * PI / 2.0,
        });
        assert!((pose.theta - PI / 2.0).abs() < 1e-12);
        assert_eq!(pose.x, 1.0);
        assert_eq!(pose.y, 2.0);
    }

    #[test]
    fn test_apply_correction_preserves_heading() {
        let mut integrator = PoseIntegrator::new(Pose::new(0.0, 0.0, 0.123456789));
        integrator.rotate_left(0.987654321);
        let before = integrator.pose().theta;

        let pose = integrator.apply_correction(42.0, -7.5);
        assert_eq!(pose.x, 42.0);
        assert_eq!(pose.y, -7.5);
        assert_eq!(pose.theta.to_bits(), before.to_bits());
    }

    #[test]
    fn test_apply_motion_commands() {
        let mut integrator = PoseIntegrator::default();
        integrator.apply(MotionCommand::Forward(1.0));
        integrator.apply(MotionCommand::Right(PI / 2.0));
        integrator.apply(MotionCommand::Left(PI / 2.0));
        let pose = integrator.apply(MotionCommand::Forward(1.0));
        assert!((pose.x - 2.0).abs() < 1e-12);
        assert!(pose.y.abs() < 1e-12);
    }
}
