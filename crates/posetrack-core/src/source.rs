//! Landmark sources
//!
//! A source yields one frame per tick: the detected arm landmarks (if a
//! pose was found) and optionally the encoded camera image. Camera capture
//! and pose estimation live outside this crate behind [`LandmarkSource`].

use tokio_util::bytes::Bytes;

use crate::tracking::ArmLandmarks;

/// One captured frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkFrame {
    /// Arm landmarks, `None` when no pose was detected
    pub landmarks: Option<ArmLandmarks>,
    /// JPEG-encoded image for the live feed
    pub image: Option<Bytes>,
}

/// Producer of landmark frames.
///
/// Returning `None` means the source is exhausted (camera closed) and the
/// tracking loop ends.
pub trait LandmarkSource: Send {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<LandmarkFrame>;
}

/// Replays a fixed list of frames
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: std::collections::VecDeque<LandmarkFrame>,
}

impl ReplaySource {
    /// Replay `frames` in order
    pub fn new(frames: impl IntoIterator<Item = LandmarkFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Frames not yet replayed
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ReplaySource {
    fn next_frame(&mut self) -> Option<LandmarkFrame> {
        self.frames.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::Point;

    #[test]
    fn test_replay_source_exhausts() {
        let arm = ArmLandmarks {
            shoulder: Point::new(0.5, 0.2),
            elbow: Point::new(0.5, 0.5),
            wrist: Point::new(0.5, 0.8),
        };
        let mut source = ReplaySource::new([
            LandmarkFrame {
                landmarks: Some(arm),
                image: None,
            },
            LandmarkFrame::default(),
        ]);

        assert_eq!(source.next_frame().unwrap().landmarks, Some(arm));
        assert_eq!(source.remaining(), 1);
        assert!(source.next_frame().unwrap().landmarks.is_none());
        assert!(source.next_frame().is_none());
    }
}
