//! Background task that owns the physical connection.
//!
//! One driver runs per [`super::WsConnection`]. It handles every lifecycle
//! event of that connection in order, so callbacks never overlap.

use std::sync::Arc;
use std::time::Duration;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{FutureExt, SinkExt, StreamExt};
use livetable_shared::Decode;
use tokio::sync::watch;
use url::Url;

use super::connection::{ConnectionState, Handlers, StatsCounters};
use super::connector::{CloseInfo, Connector, Frame, FrameSink, SocketPair};
use crate::credentials::CredentialProvider;
use crate::error::TransportError;

pub(crate) struct Driver<M> {
    pub(crate) endpoint: Url,
    pub(crate) reconnect_delay: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) credential_param: String,
    pub(crate) handlers: Handlers<M>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) credentials: Option<Arc<dyn CredentialProvider>>,
    pub(crate) state: watch::Sender<ConnectionState>,
    pub(crate) stats: Arc<StatsCounters>,
}

/// Resolves once `close()` was called or the connection was dropped.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl<M: Decode + Send + 'static> Driver<M> {
    pub(crate) async fn run(
        self,
        mut commands: UnboundedReceiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut attempt: u64 = 0;

        while !*shutdown.borrow() {
            let Some(url) = self.attempt_url() else {
                tracing::warn!(
                    "no credential for {}, retrying in {:?}",
                    self.endpoint,
                    self.reconnect_delay
                );
                if self.pause(&mut shutdown).await {
                    continue;
                }
                break;
            };

            attempt += 1;
            StatsCounters::bump(&self.stats.connect_attempts);
            self.set_state(ConnectionState::Connecting { attempt });
            tracing::info!("connecting to {} (attempt {})", self.endpoint, attempt);

            let connect =
                tokio::time::timeout(self.connect_timeout, self.connector.connect(url.as_str()));
            let outcome = tokio::select! {
                outcome = connect => outcome,
                _ = stop_requested(&mut shutdown) => break,
            };

            let close = match outcome {
                Ok(Ok(socket)) => match self.serve(socket, &mut commands, &mut shutdown).await {
                    Some(close) => close,
                    // stopped while open; on_close already ran
                    None => break,
                },
                Ok(Err(err)) => self.fail(err),
                Err(_) => self.fail(TransportError::Timeout(self.connect_timeout)),
            };
            self.closed(&close, &mut commands);

            if !self.pause(&mut shutdown).await {
                break;
            }
        }

        self.drop_pending(&mut commands);
        self.set_state(ConnectionState::Stopped);
        tracing::info!("transport to {} stopped", self.endpoint);
    }

    /// Pump one open connection until it ends. Returns `None` when it ended
    /// because a stop was requested.
    async fn serve(
        &self,
        socket: SocketPair,
        commands: &mut UnboundedReceiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<CloseInfo> {
        let SocketPair { mut sink, mut stream } = socket;

        self.set_state(ConnectionState::Open);
        StatsCounters::bump(&self.stats.opens);
        tracing::info!("connected to {}", self.endpoint);
        self.handlers.open();

        let mut commands_open = true;
        loop {
            tokio::select! {
                _ = stop_requested(shutdown) => {
                    self.set_state(ConnectionState::Closing);
                    self.shutdown_sink(&mut sink).await;
                    self.closed(&CloseInfo::normal("closed by client"), commands);
                    return None;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => self.deliver(text.as_bytes()),
                    Some(Ok(Frame::Binary(bytes))) => self.deliver(&bytes),
                    Some(Ok(Frame::Close(info))) => {
                        self.set_state(ConnectionState::Closing);
                        // flushes the close reply queued by the socket
                        self.shutdown_sink(&mut sink).await;
                        return Some(info);
                    }
                    Some(Err(err)) => {
                        tracing::error!("read error on {}: {}", self.endpoint, err);
                        self.set_state(ConnectionState::Closing);
                        let close = self.fail(err);
                        self.shutdown_sink(&mut sink).await;
                        return Some(close);
                    }
                    None => {
                        self.set_state(ConnectionState::Closing);
                        return Some(CloseInfo::abnormal("connection dropped"));
                    }
                },
                command = commands.next(), if commands_open => match command {
                    Some(text) => {
                        if let Err(err) = sink.send(text).await {
                            tracing::error!("send failed on {}: {}", self.endpoint, err);
                            self.set_state(ConnectionState::Closing);
                            return Some(self.fail(err));
                        }
                        StatsCounters::bump(&self.stats.messages_sent);
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    fn deliver(&self, frame: &[u8]) {
        StatsCounters::bump(&self.stats.frames_received);
        tracing::trace!("received from {}: {}", self.endpoint, String::from_utf8_lossy(frame));

        match M::decode(frame) {
            Ok(message) => self.handlers.message(message),
            Err(err) => {
                StatsCounters::bump(&self.stats.frames_dropped);
                tracing::warn!("dropping {} frame from {}: {}", err.kind(), self.endpoint, err);
                self.handlers.decode_error(&err);
            }
        }
    }

    async fn shutdown_sink(&self, sink: &mut FrameSink) {
        if let Err(err) = sink.close().await {
            tracing::debug!("error closing socket to {}: {}", self.endpoint, err);
        }
    }

    /// Report an error; the caller then drives the close transition.
    fn fail(&self, err: TransportError) -> CloseInfo {
        if err.is_transient() {
            tracing::warn!("transport error on {}: {}", self.endpoint, err);
        } else {
            tracing::error!("transport error on {}: {}", self.endpoint, err);
        }
        self.handlers.error(&err);
        CloseInfo::abnormal(err.to_string())
    }

    fn closed(&self, close: &CloseInfo, commands: &mut UnboundedReceiver<String>) {
        StatsCounters::bump(&self.stats.closes);
        tracing::info!(
            "connection to {} closed (code {}, {:?})",
            self.endpoint,
            close.code,
            close.reason
        );
        self.handlers.close(close);
        self.drop_pending(commands);
    }

    /// Sleep for the reconnect delay. Returns false if a stop arrived first.
    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }
        self.set_state(ConnectionState::WaitingToReconnect {
            delay: self.reconnect_delay,
        });
        tracing::info!("reconnecting to {} in {:?}", self.endpoint, self.reconnect_delay);

        tokio::select! {
            _ = tokio::time::sleep(self.reconnect_delay) => true,
            _ = stop_requested(shutdown) => false,
        }
    }

    /// Count payloads that were queued but never written.
    fn drop_pending(&self, commands: &mut UnboundedReceiver<String>) {
        while let Some(Some(_)) = commands.next().now_or_never() {
            StatsCounters::bump(&self.stats.sends_dropped);
        }
    }

    fn attempt_url(&self) -> Option<Url> {
        let Some(provider) = &self.credentials else {
            return Some(self.endpoint.clone());
        };
        let credential = provider.credential()?;
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(&self.credential_param, &credential);
        Some(url)
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::debug!("{} -> {:?}", self.endpoint, state);
        self.state.send_replace(state);
    }
}

