//! Sliding-window series
//!
//! Bounded per-channel history of landmark coordinates, used to feed the
//! live chart. Each channel keeps the most recent `max_points` values in
//! arrival order and drops the oldest first.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::protocol::PoseSample;

/// Number of points retained per channel by default
pub const DEFAULT_MAX_POINTS: usize = 50;

/// One of the six landmark coordinate channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    /// Shoulder x
    ShoulderX,
    /// Shoulder y
    ShoulderY,
    /// Elbow x
    ElbowX,
    /// Elbow y
    ElbowY,
    /// Wrist x
    WristX,
    /// Wrist y
    WristY,
}

impl Channel {
    /// All channels, in chart order
    pub const ALL: [Channel; 6] = [
        Channel::ShoulderX,
        Channel::ShoulderY,
        Channel::ElbowX,
        Channel::ElbowY,
        Channel::WristX,
        Channel::WristY,
    ];

    /// Field name used on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            Channel::ShoulderX => "shoulderX",
            Channel::ShoulderY => "shoulderY",
            Channel::ElbowX => "elbowX",
            Channel::ElbowY => "elbowY",
            Channel::WristX => "wristX",
            Channel::WristY => "wristY",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Channel::ShoulderX => "Shoulder X",
            Channel::ShoulderY => "Shoulder Y",
            Channel::ElbowX => "Elbow X",
            Channel::ElbowY => "Elbow Y",
            Channel::WristX => "Wrist X",
            Channel::WristY => "Wrist Y",
        }
    }

    /// Look up a channel by its wire name
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Channel::ALL.into_iter().find(|c| c.wire_name() == name)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Fixed-capacity FIFO of samples for a single channel
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
    max_points: usize,
}

impl SlidingWindow {
    /// Create an empty window holding at most `max_points` values.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(max_points: usize) -> Self {
        let max_points = max_points.max(1);
        Self {
            values: VecDeque::with_capacity(max_points),
            max_points,
        }
    }

    /// Return a copy of this window with `value` appended, truncated from
    /// the front to at most `max_points` entries.
    pub fn append(&self, value: f64) -> Self {
        let mut next = self.clone();
        next.push(value);
        next
    }

    /// Append in place, evicting the oldest value once full
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.max_points {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Number of values currently held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Capacity bound
    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Oldest-to-newest iterator
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Most recent value
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Values as a vector, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Drop all values
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

/// The six channel windows, always updated together.
///
/// A `PoseSeries` is treated as an immutable snapshot: [`PoseSeries::append`]
/// returns a new value so readers holding the previous one never see a
/// partially applied sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSeries {
    windows: [SlidingWindow; 6],
    /// Number of samples applied since creation or the last clear
    samples_seen: u64,
}

impl PoseSeries {
    /// Create empty windows with the given bound
    pub fn new(max_points: usize) -> Self {
        Self {
            windows: std::array::from_fn(|_| SlidingWindow::new(max_points)),
            samples_seen: 0,
        }
    }

    /// Apply one sample to all six channels and return the resulting series
    pub fn append(&self, sample: &PoseSample) -> Self {
        let mut next = self.clone();
        for channel in Channel::ALL {
            next.windows[channel.index()].push(sample.channel_value(channel));
        }
        next.samples_seen += 1;
        next
    }

    /// Window for a single channel
    pub fn channel(&self, channel: Channel) -> &SlidingWindow {
        &self.windows[channel.index()]
    }

    /// Iterate `(channel, window)` pairs in chart order
    pub fn channels(&self) -> impl Iterator<Item = (Channel, &SlidingWindow)> {
        Channel::ALL.into_iter().map(move |c| (c, self.channel(c)))
    }

    /// Number of points currently retained (identical for every channel)
    pub fn len(&self) -> usize {
        self.windows[0].len()
    }

    /// Whether no points are retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity bound shared by all channels
    pub fn max_points(&self) -> usize {
        self.windows[0].max_points()
    }

    /// Total samples applied, including evicted ones
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Return an empty series with the same bound
    pub fn cleared(&self) -> Self {
        Self::new(self.max_points())
    }
}

impl Default for PoseSeries {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Stage;
    use pretty_assertions::assert_eq;

    fn sample_with(value: f64) -> PoseSample {
        PoseSample {
            angle: 90.0,
            reps: 0,
            stage: Stage::None,
            shoulder_x: value,
            shoulder_y: value + 1000.0,
            elbow_x: value,
            elbow_y: value,
            wrist_x: value,
            wrist_y: value,
        }
    }

    #[test]
    fn test_empty_window_accepts_first_value() {
        let window = SlidingWindow::new(50);
        let next = window.append(1.5);
        assert!(window.is_empty());
        assert_eq!(next.to_vec(), vec![1.5]);
    }

    #[test]
    fn test_len_is_min_of_appends_and_bound() {
        let mut window = SlidingWindow::new(DEFAULT_MAX_POINTS);
        for i in 0..120 {
            window = window.append(i as f64);
            assert_eq!(window.len(), (i + 1).min(DEFAULT_MAX_POINTS));
        }
    }

    #[test]
    fn test_full_window_evicts_exactly_one() {
        let mut window = SlidingWindow::new(3);
        window.push(1.0);
        window.push(2.0);
        window.push(3.0);
        let next = window.append(4.0);
        assert_eq!(next.to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sixty_samples_keep_last_fifty() {
        let mut series = PoseSeries::default();
        for i in 0..60 {
            series = series.append(&sample_with(i as f64));
        }
        let expected: Vec<f64> = (10..60).map(|i| i as f64).collect();
        assert_eq!(series.channel(Channel::ShoulderX).to_vec(), expected);
        assert_eq!(series.len(), 50);
        assert_eq!(series.samples_seen(), 60);
    }

    #[test]
    fn test_append_leaves_previous_snapshot_untouched() {
        let before = PoseSeries::new(4).append(&sample_with(1.0));
        let after = before.append(&sample_with(2.0));

        for (_, window) in before.channels() {
            assert_eq!(window.len(), 1);
        }
        for (_, window) in after.channels() {
            assert_eq!(window.len(), 2);
        }
        assert_eq!(after.channel(Channel::ShoulderY).latest(), Some(1002.0));
    }

    #[test]
    fn test_channel_wire_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_wire_name(channel.wire_name()), Some(channel));
        }
        assert_eq!(Channel::from_wire_name("hipX"), None);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let window = SlidingWindow::new(0).append(1.0).append(2.0);
        assert_eq!(window.to_vec(), vec![2.0]);
    }
}
