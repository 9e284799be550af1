//! Dead reckoning: relative motion integrated into a pose.

mod integrator;

pub use integrator::{MotionCommand, PoseIntegrator};
