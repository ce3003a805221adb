//! In-memory connector for tests.
//!
//! Every successful [`MockConnector::connect`] hands the server side of the
//! new socket to the test as a [`MockPeer`].

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_channel::mpsc;
use futures_util::{Sink, StreamExt};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::connector::{CloseInfo, Connector, Frame, SocketPair};
use crate::error::{TransportError, TransportResult};

/// One recorded call to `connect`.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub url: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MockState {
    attempts: Vec<Attempt>,
    refuse: usize,
    stall: usize,
}

/// Connector whose sockets are driven by the test.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    peers: tokio::sync::mpsc::UnboundedSender<MockPeer>,
}

/// Receives the peers of accepted connections, in accept order.
pub struct MockPeers(tokio::sync::mpsc::UnboundedReceiver<MockPeer>);

impl MockPeers {
    pub async fn next(&mut self) -> Option<MockPeer> {
        self.0.recv().await
    }
}

impl MockConnector {
    pub fn new() -> (Self, MockPeers) {
        let (peers, rx) = tokio::sync::mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(MockState::default())),
            peers,
        };
        (connector, MockPeers(rx))
    }

    /// Fail the next `n` attempts with [`TransportError::Connect`].
    pub fn refuse_next(&self, n: usize) {
        self.state.lock().refuse = n;
    }

    /// Never complete the next `n` attempts.
    pub fn stall_next(&self, n: usize) {
        self.state.lock().stall = n;
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.state.lock().attempts.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> TransportResult<SocketPair> {
        let (refused, stalled) = {
            let mut state = self.state.lock();
            state.attempts.push(Attempt {
                url: url.to_string(),
                at: Instant::now(),
            });
            if state.refuse > 0 {
                state.refuse -= 1;
                (true, false)
            } else if state.stall > 0 {
                state.stall -= 1;
                (false, true)
            } else {
                (false, false)
            }
        };

        if refused {
            return Err(TransportError::Connect(format!("{url}: connection refused")));
        }
        if stalled {
            std::future::pending::<()>().await;
        }

        let (frames_tx, frames_rx) = mpsc::unbounded();
        let (sent_tx, sent_rx) = mpsc::unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let peer = MockPeer {
            frames: frames_tx,
            sent: sent_rx,
            closed: closed.clone(),
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportError::Connect("mock peers dropped".into()))?;

        let sink = MockSink {
            sent: sent_tx,
            closed,
        };
        Ok(SocketPair {
            sink: Box::pin(sink),
            stream: Box::pin(frames_rx),
        })
    }
}

/// Client write half of a mock socket.
struct MockSink {
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Sink<String> for MockSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.sent.is_closed() {
            return Poll::Ready(Err(TransportError::Socket("peer hung up".into())));
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.sent
            .unbounded_send(item)
            .map_err(|e| TransportError::Socket(e.to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.closed.store(true, Ordering::SeqCst);
        self.sent.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// Server side of a mock socket. Dropping it drops the connection.
pub struct MockPeer {
    frames: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frames.unbounded_send(Ok(Frame::Text(text.into())));
    }

    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(value.to_string());
    }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.frames.unbounded_send(Ok(Frame::Binary(bytes.into())));
    }

    /// Send a close frame and hang up.
    pub fn close(self, code: u16, reason: &str) {
        let _ = self.frames.unbounded_send(Ok(Frame::Close(CloseInfo {
            code,
            reason: reason.to_string(),
            clean: true,
        })));
    }

    /// Fail the read side with a socket error.
    pub fn fail(self, message: &str) {
        let _ = self
            .frames
            .unbounded_send(Err(TransportError::Socket(message.to_string())));
    }

    /// Flag set once the client closed its write half, as opposed to just
    /// dropping it.
    pub fn client_closed(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    /// Next payload the client wrote, or `None` once the client hung up.
    pub async fn recv_sent(&mut self) -> Option<String> {
        self.sent.next().await
    }
}
