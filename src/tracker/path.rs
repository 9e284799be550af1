//! Trail of visited world positions.

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::geometry::{ImagePoint, Pose, WorldPoint};

/// Append-only record of positions, one entry per pose update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathHistory {
    points: Vec<WorldPoint>,
}

impl PathHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the position of a pose update.
    pub fn record(&mut self, pose: &Pose) {
        self.points.push(pose.position());
    }

    pub fn points(&self) -> &[WorldPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&WorldPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Total walked distance along the trail, in meters.
    pub fn length_m(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
            .sum()
    }

    /// Project the trail into image space for drawing.
    pub fn to_image(&self, calibration: &Calibration) -> Vec<ImagePoint> {
        self.points
            .iter()
            .map(|p| calibration.world_to_image(p.x, p.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_length() {
        let mut path = PathHistory::new();
        assert!(path.is_empty());
        path.record(&Pose::new(0.0, 0.0, 0.0));
        path.record(&Pose::new(3.0, 4.0, 0.0));
        path.record(&Pose::new(3.0, 4.0, 1.0));
        assert_eq!(path.len(), 3);
        assert_eq!(path.last(), Some(&WorldPoint::new(3.0, 4.0)));
        assert_eq!(path.length_m(), 5.0);

        path.clear();
        assert!(path.is_empty());
    }

    #[test]
    fn test_to_image() {
        let calibration = Calibration::from_two_points(
            ImagePoint::new(0.0, 0.0),
            ImagePoint::new(200.0, 0.0),
            20.0,
            ImagePoint::new(10.0, 10.0),
        )
        .unwrap();
        let mut path = PathHistory::new();
        path.record(&Pose::new(5.0, 0.0, 0.0));
        assert_eq!(path.to_image(&calibration), vec![ImagePoint::new(60.0, 10.0)]);
    }
}
