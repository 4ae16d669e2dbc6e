//! Pose Tracking
//!
//! Turns landmark frames into `pose_data` samples: the elbow angle from
//! the shoulder, elbow and wrist positions, and a curl rep counter driven
//! by that angle.

mod angle;
mod reps;
mod tracker;

pub use angle::joint_angle;
pub use reps::RepCounter;
pub use tracker::PoseTracker;

use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates (0..1, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
}

impl Point {
    /// Point at `(x, y)`
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The three arm landmarks used for curl tracking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmLandmarks {
    /// Shoulder landmark
    pub shoulder: Point,
    /// Elbow landmark (the measured joint)
    pub elbow: Point,
    /// Wrist landmark
    pub wrist: Point,
}
