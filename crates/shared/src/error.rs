//! Error types for decoding and validating change-stream frames.

use thiserror::Error;

/// A change event that parsed as JSON but violates the event contract.
///
/// These are rejected at the decode boundary so the reducer only ever sees
/// well-formed events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("{event} event has no keys")]
    MissingKeys { event: &'static str },

    #[error("{event} event is missing its item")]
    MissingItem { event: &'static str },

    #[error("invalid {event} item: {reason}")]
    InvalidItem { event: &'static str, reason: String },
}

/// Why an inbound frame was dropped.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a valid change event: {0}")]
    Invalid(#[from] EventError),
}

impl FrameError {
    /// Short label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::Utf8(_) => "utf8",
            FrameError::Json(_) => "json",
            FrameError::Invalid(_) => "invalid",
        }
    }
}

/// A reducer policy name that is not recognized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {policy} {value:?}")]
pub struct UnknownPolicy {
    pub policy: &'static str,
    pub value: String,
}
