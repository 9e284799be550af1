//! Floor-plan calibration: the image ↔ world transform and the two-point
//! tap sequence that produces it.

mod calibrator;
mod transform;

pub use calibrator::{TapOutcome, TwoPointCalibrator};
pub use transform::{
    compute_from_two_points, image_to_world, world_to_image, Calibration, CalibrationError,
};
