//! Curl repetition counter

use crate::config::TrackingConfig;
use crate::protocol::Stage;

/// Counts curls from a stream of elbow angles.
///
/// The arm must first extend past `down_threshold` (stage Down); a later
/// angle below `up_threshold` then completes one rep (stage Up). Further
/// low angles do not count again until the arm has extended.
#[derive(Debug, Clone)]
pub struct RepCounter {
    down_threshold: f64,
    up_threshold: f64,
    stage: Stage,
    count: u32,
}

impl RepCounter {
    /// Counter with explicit thresholds in degrees
    pub fn new(down_threshold: f64, up_threshold: f64) -> Self {
        Self {
            down_threshold,
            up_threshold,
            stage: Stage::None,
            count: 0,
        }
    }

    /// Counter using the configured thresholds
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.down_threshold, config.up_threshold)
    }

    /// Feed one angle and return the updated stage
    pub fn update(&mut self, angle: f64) -> Stage {
        if angle > self.down_threshold {
            self.stage = Stage::Down;
        }
        if angle < self.up_threshold && self.stage == Stage::Down {
            self.stage = Stage::Up;
            self.count += 1;
            tracing::debug!("Rep {} completed at {:.1} degrees", self.count, angle);
        }
        self.stage
    }

    /// Completed reps
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Back to zero reps and no stage
    pub fn reset(&mut self) {
        self.stage = Stage::None;
        self.count = 0;
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default())
    }
}
