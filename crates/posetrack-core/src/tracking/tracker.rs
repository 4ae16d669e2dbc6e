//! Landmarks to samples

use super::{joint_angle, ArmLandmarks, RepCounter};
use crate::config::TrackingConfig;
use crate::protocol::{PoseSample, ProtocolError};

/// Per-session tracker producing one [`PoseSample`] per detected pose
#[derive(Debug, Clone, Default)]
pub struct PoseTracker {
    counter: RepCounter,
    frames: u64,
}

impl PoseTracker {
    /// Tracker with a fresh rep counter
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            counter: RepCounter::from_config(config),
            frames: 0,
        }
    }

    /// Compute the elbow angle, advance the rep counter and build a sample.
    ///
    /// Landmarks with non-finite coordinates are rejected without touching
    /// the counter.
    pub fn process(&mut self, arm: &ArmLandmarks) -> Result<PoseSample, ProtocolError> {
        let angle = joint_angle(arm.shoulder, arm.elbow, arm.wrist);
        let mut sample = PoseSample {
            angle,
            reps: self.counter.count(),
            stage: self.counter.stage(),
            shoulder_x: arm.shoulder.x,
            shoulder_y: arm.shoulder.y,
            elbow_x: arm.elbow.x,
            elbow_y: arm.elbow.y,
            wrist_x: arm.wrist.x,
            wrist_y: arm.wrist.y,
        };
        sample.validate()?;

        sample.stage = self.counter.update(angle);
        sample.reps = self.counter.count();
        self.frames += 1;
        Ok(sample)
    }

    /// Reps counted so far
    pub fn reps(&self) -> u32 {
        self.counter.count()
    }

    /// Number of samples produced
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Stage;
    use crate::tracking::Point;

    fn arm(wrist: Point) -> ArmLandmarks {
        ArmLandmarks {
            shoulder: Point::new(0.5, 0.2),
            elbow: Point::new(0.5, 0.5),
            wrist,
        }
    }

    #[test]
    fn test_extended_then_curled_counts_rep() {
        let mut tracker = PoseTracker::default();

        let extended = tracker.process(&arm(Point::new(0.5, 0.8))).unwrap();
        assert!((extended.angle - 180.0).abs() < 1e-9);
        assert_eq!(extended.stage, Stage::Down);
        assert_eq!(extended.reps, 0);

        let curled = tracker.process(&arm(Point::new(0.52, 0.25))).unwrap();
        assert!(curled.angle < 30.0);
        assert_eq!(curled.stage, Stage::Up);
        assert_eq!(curled.reps, 1);
        assert_eq!(curled.wrist_y, 0.25);
        assert_eq!(tracker.frames(), 2);
    }

    #[test]
    fn test_non_finite_landmark_rejected() {
        let mut tracker = PoseTracker::default();
        let result = tracker.process(&arm(Point::new(f64::NAN, 0.8)));
        assert!(result.is_err());
        assert_eq!(tracker.frames(), 0);
        assert_eq!(tracker.reps(), 0);
    }
}
