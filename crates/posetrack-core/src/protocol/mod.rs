//! Tracking Channel Protocol
//!
//! Event types exchanged between a tracking client and the pose server,
//! plus the newline-delimited JSON framing used on the TCP channel.
//!
//! Inbound `pose_data` payloads are decoded into a loosely typed form first
//! and then validated, so a missing field, a non-numeric coordinate or an
//! unknown stage label becomes a [`ProtocolError`] instead of a bad sample.

mod codec;
mod error;
mod events;

pub use codec::{EventCodec, EventReader};
pub use error::ProtocolError;
pub use events::{
    decode_client_event, decode_server_event, ClientEvent, Envelope, PoseSample, ServerEvent,
    Stage, StatusMessage, POSE_DATA, START_TRACKING, STATUS, STOP_TRACKING,
};

/// Default port of the event channel
pub const DEFAULT_EVENT_PORT: u16 = 5000;

/// Maximum length of one encoded frame in bytes
pub const MAX_FRAME_SIZE: usize = 8192;
