//! Demo Mode - Simulated arm curls for testing
//!
//! Generates realistic shoulder/elbow/wrist landmarks without a camera.
//! Simulates a person doing slow curls with short random rests between
//! reps, a little body sway and the occasional frame where no pose is
//! detected.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::f64::consts::PI;
use tokio_util::bytes::Bytes;

use crate::source::{LandmarkFrame, LandmarkSource};
use crate::tracking::{ArmLandmarks, Point};

/// Elbow angle with the arm extended (degrees)
const EXTENDED_ANGLE: f64 = 172.0;
/// Elbow angle at the top of a curl (degrees)
const CURLED_ANGLE: f64 = 18.0;

const LIFT_MS: u64 = 800;
const HOLD_MS: u64 = 300;
const LOWER_MS: u64 = 900;

/// Upper arm and forearm lengths in normalized image units
const UPPER_ARM: f64 = 0.22;
const FOREARM: f64 = 0.2;

/// Simulated landmark source producing arm curls
pub struct DemoSource {
    /// Milliseconds advanced per frame
    frame_interval_ms: u64,
    /// Simulated time (ms)
    sim_time_ms: u64,
    /// Time of the next lift (ms)
    next_lift_at_ms: u64,
    /// Current curl phase
    phase: CurlPhase,
    /// Probability of a frame with no detected pose
    dropout_chance: f64,
    /// Image attached to every frame, if any
    image: Option<Bytes>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CurlPhase {
    /// Arm hanging extended
    Rest,
    /// Forearm rising
    Lift { start_ms: u64 },
    /// Held at the top
    Hold { start_ms: u64 },
    /// Forearm lowering
    Lower { start_ms: u64 },
}

impl DemoSource {
    /// Create a demo source advancing `frame_interval_ms` per frame
    pub fn new(frame_interval_ms: u64) -> Self {
        Self::with_rng(frame_interval_ms, StdRng::from_entropy())
    }

    /// Deterministic demo source
    pub fn with_seed(frame_interval_ms: u64, seed: u64) -> Self {
        Self::with_rng(frame_interval_ms, StdRng::seed_from_u64(seed))
    }

    fn with_rng(frame_interval_ms: u64, mut rng: StdRng) -> Self {
        let first_lift = rng.gen_range(500..1500);
        Self {
            frame_interval_ms: frame_interval_ms.max(1),
            sim_time_ms: 0,
            next_lift_at_ms: first_lift,
            phase: CurlPhase::Rest,
            dropout_chance: 0.02,
            image: None,
            rng,
        }
    }

    /// Attach a JPEG image to every frame (e.g. a placeholder for the live feed)
    pub fn with_image(mut self, image: Bytes) -> Self {
        self.image = Some(image);
        self
    }

    /// Set the per-frame probability of a missing pose (clamped to 0..=1)
    pub fn with_dropout(mut self, chance: f64) -> Self {
        self.dropout_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Simulated time in milliseconds
    pub fn sim_time_ms(&self) -> u64 {
        self.sim_time_ms
    }

    /// Advance the curl state machine
    fn update_phase(&mut self) {
        let now = self.sim_time_ms;
        match self.phase {
            CurlPhase::Rest => {
                if now >= self.next_lift_at_ms {
                    self.phase = CurlPhase::Lift { start_ms: now };
                }
            }
            CurlPhase::Lift { start_ms } => {
                if now >= start_ms + LIFT_MS {
                    self.phase = CurlPhase::Hold { start_ms: now };
                }
            }
            CurlPhase::Hold { start_ms } => {
                if now >= start_ms + HOLD_MS {
                    self.phase = CurlPhase::Lower { start_ms: now };
                }
            }
            CurlPhase::Lower { start_ms } => {
                if now >= start_ms + LOWER_MS {
                    self.phase = CurlPhase::Rest;
                    self.next_lift_at_ms = now + self.rng.gen_range(600..1500);
                }
            }
        }
    }

    /// Elbow angle for the current phase, before jitter
    fn target_angle(&self) -> f64 {
        let now = self.sim_time_ms;
        // Cosine easing between the two extremes
        let ease = |start_ms: u64, duration_ms: u64| {
            let progress = ((now - start_ms) as f64 / duration_ms as f64).min(1.0);
            (1.0 - (progress * PI).cos()) / 2.0
        };

        match self.phase {
            CurlPhase::Rest => EXTENDED_ANGLE,
            CurlPhase::Lift { start_ms } => {
                EXTENDED_ANGLE + (CURLED_ANGLE - EXTENDED_ANGLE) * ease(start_ms, LIFT_MS)
            }
            CurlPhase::Hold { .. } => CURLED_ANGLE,
            CurlPhase::Lower { start_ms } => {
                CURLED_ANGLE + (EXTENDED_ANGLE - CURLED_ANGLE) * ease(start_ms, LOWER_MS)
            }
        }
    }

    fn landmarks(&mut self) -> ArmLandmarks {
        let t = self.sim_time_ms as f64 / 1000.0;

        // Body sway
        let shoulder = Point::new(
            0.55 + 0.004 * (t * 0.9).sin() + self.rng.gen_range(-0.001..0.001),
            0.30 + 0.003 * (t * 1.3).sin() + self.rng.gen_range(-0.001..0.001),
        );
        let elbow = Point::new(shoulder.x + 0.02, shoulder.y + UPPER_ARM);

        let angle = (self.target_angle() + self.rng.gen_range(-1.5..1.5)).clamp(0.0, 180.0);

        // Rotate the forearm away from the upper arm by the elbow angle
        let upper = (shoulder.y - elbow.y).atan2(shoulder.x - elbow.x);
        let forearm = upper + angle.to_radians();
        let wrist = Point::new(
            elbow.x + FOREARM * forearm.cos(),
            elbow.y + FOREARM * forearm.sin(),
        );

        ArmLandmarks {
            shoulder,
            elbow,
            wrist,
        }
    }
}

impl LandmarkSource for DemoSource {
    fn next_frame(&mut self) -> Option<LandmarkFrame> {
        self.update_phase();

        let landmarks = if self.rng.gen_bool(self.dropout_chance) {
            None
        } else {
            Some(self.landmarks())
        };

        self.sim_time_ms += self.frame_interval_ms;
        Some(LandmarkFrame {
            landmarks,
            image: self.image.clone(),
        })
    }
}
