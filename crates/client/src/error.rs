//! Error types for the livetable client.

use std::time::Duration;

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by the streaming transport.
///
/// Everything except [`TransportError::NotConnected`] and
/// [`TransportError::Encode`] is transient: the transport reports it through
/// `on_error` and reconnects on its own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Reading from or writing to an open connection failed.
    #[error("socket error: {0}")]
    Socket(String),

    /// The connection did not open in time.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// A payload was sent while the connection was not open. It was dropped.
    #[error("not connected")]
    NotConnected,

    /// The outbound payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

impl TransportError {
    /// True for failures the reconnect loop recovers from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Socket(_) | TransportError::Timeout(_)
        )
    }
}

/// Invalid client configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid url {url:?}: {reason}")]
    Url { url: String, reason: String },
}

/// Errors from session setup and snapshot retrieval.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("snapshot request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("snapshot request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
