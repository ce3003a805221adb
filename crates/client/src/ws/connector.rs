//! Opening physical connections.
//!
//! The driver only sees a [`SocketPair`]: a sink of outbound text frames and
//! a stream of inbound [`Frame`]s. [`TungsteniteConnector`] provides the real
//! socket; tests plug in [`super::MockConnector`].

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

use crate::error::{TransportError, TransportResult};

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// True when a close frame was exchanged.
    pub clean: bool,
}

impl CloseInfo {
    pub const NORMAL: u16 = 1000;
    pub const NO_STATUS: u16 = 1005;
    pub const ABNORMAL: u16 = 1006;

    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: Self::NORMAL,
            reason: reason.into(),
            clean: true,
        }
    }

    /// The connection ended without a close frame.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: Self::ABNORMAL,
            reason: reason.into(),
            clean: false,
        }
    }
}

/// An inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close(CloseInfo),
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Both halves of an open connection.
pub struct SocketPair {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens a connection to a URL.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> TransportResult<SocketPair>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> TransportResult<SocketPair> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .with(|text: String| {
                future::ready(Ok::<_, tungstenite::Error>(Message::Text(text.into())))
            })
            .sink_map_err(|e| TransportError::Socket(e.to_string()));
        let stream = read.filter_map(|msg| future::ready(map_message(msg)));

        Ok(SocketPair {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn map_message(msg: Result<Message, tungstenite::Error>) -> Option<Result<Frame, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
        Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
        Ok(Message::Close(frame)) => Some(Ok(Frame::Close(match frame {
            Some(frame) => CloseInfo {
                code: u16::from(frame.code),
                reason: frame.reason.to_string(),
                clean: true,
            },
            None => CloseInfo {
                code: CloseInfo::NO_STATUS,
                reason: String::new(),
                clean: true,
            },
        }))),
        // ping/pong are answered by tungstenite
        Ok(_) => None,
        Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
    }
}
