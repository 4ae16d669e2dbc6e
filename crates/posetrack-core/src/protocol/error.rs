//! Protocol errors

use thiserror::Error;

/// Errors raised while encoding, decoding or validating channel events
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    #[error("Event '{0}' is missing its payload")]
    MissingPayload(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{field}' is not a finite number: {value}")]
    NonFiniteValue { field: &'static str, value: f64 },

    #[error("Angle {0} is outside 0..=180 degrees")]
    AngleOutOfRange(f64),

    #[error("Invalid rep count: {0}")]
    InvalidReps(i64),

    #[error("Unknown stage label '{0}'")]
    UnknownStage(String),

    #[error("Frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    #[error("Channel closed")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
