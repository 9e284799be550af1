//! Two-point calibration from a tap sequence.
//!
//! The user taps two points on the floor plan and then enters the real
//! distance between them. The first tap becomes the image anchor.

use crate::geometry::ImagePoint;

use super::transform::{Calibration, CalibrationError};

/// What the calibrator expects after a tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    /// First point recorded, tap the second one.
    AwaitingSecondPoint,
    /// Both points recorded, enter the real distance.
    AwaitingDistance,
}

/// Collects the taps of a two-point measurement.
#[derive(Debug, Clone, Default)]
pub struct TwoPointCalibrator {
    first: Option<ImagePoint>,
    second: Option<ImagePoint>,
}

impl TwoPointCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tap. A third tap restarts the measurement from that point.
    pub fn tap(&mut self, point: ImagePoint) -> TapOutcome {
        match (self.first, self.second) {
            (Some(_), None) => {
                self.second = Some(point);
                TapOutcome::AwaitingDistance
            }
            _ => {
                self.first = Some(point);
                self.second = None;
                TapOutcome::AwaitingSecondPoint
            }
        }
    }

    /// Number of points recorded so far.
    pub fn taps(&self) -> usize {
        self.first.iter().chain(self.second.iter()).count()
    }

    /// Finish the measurement with the real distance between the taps.
    ///
    /// On success the collected taps are cleared. On invalid input they are
    /// kept so the caller can retry with another distance.
    pub fn finish(&mut self, real_distance_m: f64) -> Result<Calibration, CalibrationError> {
        let (p1, p2) = match (self.first, self.second) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => return Err(CalibrationError::IncompleteMeasurement(self.taps())),
        };

        let calibration = Calibration::from_two_points(p1, p2, real_distance_m, p1)?;
        self.cancel();
        Ok(calibration)
    }

    /// Discard any recorded taps.
    pub fn cancel(&mut self) {
        self.first = None;
        self.second = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_sequence() {
        let mut calibrator = TwoPointCalibrator::new();
        assert_eq!(
            calibrator.tap(ImagePoint::new(10.0, 20.0)),
            TapOutcome::AwaitingSecondPoint
        );
        assert_eq!(
            calibrator.tap(ImagePoint::new(110.0, 20.0)),
            TapOutcome::AwaitingDistance
        );
        assert_eq!(calibrator.taps(), 2);

        let cal = calibrator.finish(4.0).unwrap();
        assert_eq!(cal.scale, 25.0);
        assert_eq!(cal.origin_image(), ImagePoint::new(10.0, 20.0));
        assert_eq!(calibrator.taps(), 0);
    }

    #[test]
    fn test_finish_without_two_taps() {
        let mut calibrator = TwoPointCalibrator::new();
        calibrator.tap(ImagePoint::new(1.0, 1.0));
        assert_eq!(
            calibrator.finish(2.0),
            Err(CalibrationError::IncompleteMeasurement(1))
        );
    }

    #[test]
    fn test_invalid_distance_keeps_taps() {
        let mut calibrator = TwoPointCalibrator::new();
        calibrator.tap(ImagePoint::new(0.0, 0.0));
        calibrator.tap(ImagePoint::new(50.0, 0.0));
        assert!(calibrator.finish(0.0).is_err());
        assert_eq!(calibrator.taps(), 2);
        assert!(calibrator.finish(5.0).is_ok());
    }

    #[test]
    fn test_third_tap_restarts() {
        let mut calibrator = TwoPointCalibrator::new();
        calibrator.tap(ImagePoint::new(0.0, 0.0));
        calibrator.tap(ImagePoint::new(50.0, 0.0));
        assert_eq!(
            calibrator.tap(ImagePoint::new(7.0, 7.0)),
            TapOutcome::AwaitingSecondPoint
        );
        assert_eq!(calibrator.taps(), 1);
    }
}
