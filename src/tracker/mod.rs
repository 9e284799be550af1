//! Tracking session and the timed correction loop that drives it.

mod correction_loop;
mod path;
mod session;

pub use correction_loop::{
    CorrectionLoopConfig, CorrectionLoopHandle, CorrectionLoopRunner, EventCallback, LoopError,
    DEFAULT_CORRECTION_INTERVAL_MS,
};
pub use path::PathHistory;
pub use session::{
    FloorPlan, TrackerCommand, TrackerError, TrackerEvent, TrackerSession, TrackerSnapshot,
};
