//! Event types carried on the tracking channel
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Client events carry no payload; server events are validated on decode
//! so malformed samples never reach session state.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::ProtocolError;
use crate::window::Channel;

/// Event name: client asks the server to begin tracking
pub const START_TRACKING: &str = "start_tracking";
/// Event name: client asks the server to stop tracking
pub const STOP_TRACKING: &str = "stop_tracking";
/// Event name: one processed pose sample
pub const POSE_DATA: &str = "pose_data";
/// Event name: human readable status reply
pub const STATUS: &str = "status";

/// Untyped frame as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name
    pub event: String,
    /// Event payload, absent for control events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Envelope {
    /// Build an envelope from an event name and optional payload
    pub fn new(event: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

/// Curl phase reported by the rep counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// No phase yet (or reset)
    #[default]
    None,
    /// Arm extended
    Down,
    /// Arm curled
    Up,
}

impl Stage {
    /// Wire label; `None` is the empty string
    pub fn label(&self) -> &'static str {
        match self {
            Stage::None => "",
            Stage::Down => "down",
            Stage::Up => "up",
        }
    }

    /// Parse a wire label. A missing or empty label is [`Stage::None`].
    pub fn from_label(label: Option<&str>) -> Result<Self, ProtocolError> {
        match label {
            None | Some("") => Ok(Stage::None),
            Some("down") => Ok(Stage::Down),
            Some("up") => Ok(Stage::Up),
            Some(other) => Err(ProtocolError::UnknownStage(other.to_string())),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Before the first transition the producer has no stage and sends null.
impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Stage::None => serializer.serialize_none(),
            other => serializer.serialize_str(other.label()),
        }
    }
}

/// One processed pose sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSample {
    /// Elbow angle in degrees, 0..=180
    pub angle: f64,
    /// Completed repetitions in the current tracking session
    pub reps: u32,
    /// Current curl phase
    pub stage: Stage,
    /// Shoulder x (normalized)
    pub shoulder_x: f64,
    /// Shoulder y (normalized)
    pub shoulder_y: f64,
    /// Elbow x (normalized)
    pub elbow_x: f64,
    /// Elbow y (normalized)
    pub elbow_y: f64,
    /// Wrist x (normalized)
    pub wrist_x: f64,
    /// Wrist y (normalized)
    pub wrist_y: f64,
}

impl PoseSample {
    /// Value of a single coordinate channel
    pub fn channel_value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::ShoulderX => self.shoulder_x,
            Channel::ShoulderY => self.shoulder_y,
            Channel::ElbowX => self.elbow_x,
            Channel::ElbowY => self.elbow_y,
            Channel::WristX => self.wrist_x,
            Channel::WristY => self.wrist_y,
        }
    }

    /// Check numeric invariants: finite coordinates, angle within 0..=180
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_finite("angle", self.angle)?;
        if !(0.0..=180.0).contains(&self.angle) {
            return Err(ProtocolError::AngleOutOfRange(self.angle));
        }
        for channel in Channel::ALL {
            check_finite(channel.wire_name(), self.channel_value(channel))?;
        }
        Ok(())
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFiniteValue { field, value })
    }
}

/// Loosely typed `pose_data` payload; every field is checked in [`RawPoseData::validate`]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPoseData {
    angle: Option<f64>,
    reps: Option<i64>,
    stage: Option<String>,
    shoulder_x: Option<f64>,
    shoulder_y: Option<f64>,
    elbow_x: Option<f64>,
    elbow_y: Option<f64>,
    wrist_x: Option<f64>,
    wrist_y: Option<f64>,
}

impl RawPoseData {
    fn validate(self) -> Result<PoseSample, ProtocolError> {
        fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ProtocolError> {
            value.ok_or(ProtocolError::MissingField(field))
        }

        let reps = require(self.reps, "reps")?;
        let reps = u32::try_from(reps).map_err(|_| ProtocolError::InvalidReps(reps))?;

        let sample = PoseSample {
            angle: require(self.angle, "angle")?,
            reps,
            stage: Stage::from_label(self.stage.as_deref())?,
            shoulder_x: require(self.shoulder_x, "shoulderX")?,
            shoulder_y: require(self.shoulder_y, "shoulderY")?,
            elbow_x: require(self.elbow_x, "elbowX")?,
            elbow_y: require(self.elbow_y, "elbowY")?,
            wrist_x: require(self.wrist_x, "wristX")?,
            wrist_y: require(self.wrist_y, "wristY")?,
        };
        sample.validate()?;
        Ok(sample)
    }
}

/// Status reply sent in response to start/stop requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Human readable text
    pub message: String,
}

impl StatusMessage {
    /// Status with the given text
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Events sent from the client to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// `start_tracking`
    StartTracking,
    /// `stop_tracking`
    StopTracking,
}

impl ClientEvent {
    /// Wire event name
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::StartTracking => START_TRACKING,
            ClientEvent::StopTracking => STOP_TRACKING,
        }
    }

    /// Wrap this event for the wire
    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(self.name(), None)
    }
}

impl TryFrom<Envelope> for ClientEvent {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        // Any payload on a control event is ignored
        match envelope.event.as_str() {
            START_TRACKING => Ok(ClientEvent::StartTracking),
            STOP_TRACKING => Ok(ClientEvent::StopTracking),
            _ => Err(ProtocolError::UnknownEvent(envelope.event)),
        }
    }
}

/// Events sent from the server to the client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `pose_data`
    PoseData(PoseSample),
    /// `status`
    Status(StatusMessage),
}

impl ServerEvent {
    /// Wire event name
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::PoseData(_) => POSE_DATA,
            ServerEvent::Status(_) => STATUS,
        }
    }

    /// Convenience constructor for status replies
    pub fn status(message: impl Into<String>) -> Self {
        ServerEvent::Status(StatusMessage::new(message))
    }

    /// Wrap this event for the wire
    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let data = match self {
            ServerEvent::PoseData(sample) => serde_json::to_value(sample)?,
            ServerEvent::Status(status) => serde_json::to_value(status)?,
        };
        Ok(Envelope::new(self.name(), Some(data)))
    }
}

impl TryFrom<Envelope> for ServerEvent {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let Envelope { event, data } = envelope;
        match event.as_str() {
            POSE_DATA => {
                let data = data.ok_or_else(|| ProtocolError::MissingPayload(event.clone()))?;
                let raw: RawPoseData = serde_json::from_value(data)?;
                Ok(ServerEvent::PoseData(raw.validate()?))
            }
            STATUS => {
                let data = data.ok_or_else(|| ProtocolError::MissingPayload(event.clone()))?;
                Ok(ServerEvent::Status(serde_json::from_value(data)?))
            }
            _ => Err(ProtocolError::UnknownEvent(event)),
        }
    }
}

/// Decode and validate one server frame from its JSON text
pub fn decode_server_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    ServerEvent::try_from(envelope)
}

/// Decode one client frame from its JSON text
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    ClientEvent::try_from(envelope)
}
