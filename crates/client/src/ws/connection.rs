//! WebSocket connection with state management and auto-reconnect.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedSender};
use livetable_shared::{encode, Decode, FrameError};
use serde::Serialize;
use tokio::sync::watch;
use url::Url;

use super::connector::{CloseInfo, Connector, TungsteniteConnector};
use super::driver::Driver;
use crate::config::TransportConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ConfigError, TransportError, TransportResult};

/// Connection state of a transport.
///
/// ```text
/// Connecting ─► Open ─► Closing ─► WaitingToReconnect ─► Connecting ─► …
///      └──────────────────────────────────┘
/// any state ──close()──► Stopped
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempt number `attempt` (1-based, counted over the transport's life)
    /// is opening.
    Connecting { attempt: u64 },
    Open,
    Closing,
    /// Sleeping before the next attempt.
    WaitingToReconnect { delay: Duration },
    /// Terminal. Reached only through `close()` or dropping the connection.
    Stopped,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ConnectionState::Stopped)
    }
}

/// Counters for conditions that are otherwise only visible in logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub connect_attempts: u64,
    pub opens: u64,
    pub closes: u64,
    /// Data frames received, including the ones dropped.
    pub frames_received: u64,
    /// Frames that failed to decode.
    pub frames_dropped: u64,
    pub messages_sent: u64,
    /// Payloads dropped because the connection was not open.
    pub sends_dropped: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) connect_attempts: AtomicU64,
    pub(crate) opens: AtomicU64,
    pub(crate) closes: AtomicU64,
    pub(crate) frames_received: AtomicU64,
    pub(crate) frames_dropped: AtomicU64,
    pub(crate) messages_sent: AtomicU64,
    pub(crate) sends_dropped: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransportStats {
        TransportStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            sends_dropped: self.sends_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Lifecycle callbacks. Each is called at most once per event per connection
/// attempt, always from the transport's driver task, never concurrently.
pub struct Handlers<M> {
    pub(crate) on_open: Option<Box<dyn Fn() + Send + Sync>>,
    pub(crate) on_message: Option<Box<dyn Fn(M) + Send + Sync>>,
    pub(crate) on_close: Option<Box<dyn Fn(&CloseInfo) + Send + Sync>>,
    pub(crate) on_error: Option<Box<dyn Fn(&TransportError) + Send + Sync>>,
    pub(crate) on_decode_error: Option<Box<dyn Fn(&FrameError) + Send + Sync>>,
}

impl<M> Default for Handlers<M> {
    fn default() -> Self {
        Self {
            on_open: None,
            on_message: None,
            on_close: None,
            on_error: None,
            on_decode_error: None,
        }
    }
}

impl<M> Handlers<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    /// Called with every successfully decoded frame, in receive order.
    pub fn on_message(mut self, f: impl Fn(M) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(&CloseInfo) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called for each inbound frame that was dropped because it did not
    /// decode.
    pub fn on_decode_error(mut self, f: impl Fn(&FrameError) + Send + Sync + 'static) -> Self {
        self.on_decode_error = Some(Box::new(f));
        self
    }

    pub(crate) fn open(&self) {
        if let Some(f) = &self.on_open {
            f();
        }
    }

    pub(crate) fn message(&self, message: M) {
        if let Some(f) = &self.on_message {
            f(message);
        }
    }

    pub(crate) fn close(&self, info: &CloseInfo) {
        if let Some(f) = &self.on_close {
            f(info);
        }
    }

    pub(crate) fn error(&self, error: &TransportError) {
        if let Some(f) = &self.on_error {
            f(error);
        }
    }

    pub(crate) fn decode_error(&self, error: &FrameError) {
        if let Some(f) = &self.on_decode_error {
            f(error);
        }
    }
}

/// Clonable handle for sending through a connection and observing it.
#[derive(Clone)]
pub struct WsHandle {
    sender: UnboundedSender<String>,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<StatsCounters>,
    /// Endpoint without credentials.
    pub url: String,
}

impl WsHandle {
    /// Serialize `payload` to JSON and write it if the connection is open.
    ///
    /// Nothing is queued: while the connection is not open the payload is
    /// dropped and [`TransportError::NotConnected`] is returned.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> TransportResult<()> {
        if !self.state.borrow().is_open() {
            return Err(self.dropped());
        }
        let json = encode(payload).map_err(|e| TransportError::Encode(e.to_string()))?;
        tracing::debug!("queueing {} bytes for {}", json.len(), self.url);
        self.sender
            .unbounded_send(json)
            .map_err(|_| self.dropped())
    }

    fn dropped(&self) -> TransportError {
        StatsCounters::bump(&self.stats.sends_dropped);
        tracing::debug!("dropping send to {}: not connected", self.url);
        TransportError::NotConnected
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().is_open()
    }

    pub fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }
}

/// A managed, auto-reconnecting connection to one endpoint.
///
/// Inbound frames are decoded into `M` and handed to
/// [`Handlers::on_message`]. The connection runs on a background tokio task
/// until [`WsConnection::close`] is called or the value is dropped.
pub struct WsConnection<M> {
    handle: WsHandle,
    shutdown: watch::Sender<bool>,
    _message: PhantomData<fn(M)>,
}

impl<M: Decode + Send + 'static> WsConnection<M> {
    /// Connect with the WebSocket connector and no credential.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: TransportConfig, handlers: Handlers<M>) -> Result<Self, ConfigError> {
        Self::builder(config).handlers(handlers).spawn()
    }

    pub fn builder(config: TransportConfig) -> WsConnectionBuilder<M> {
        WsConnectionBuilder {
            config,
            handlers: Handlers::default(),
            connector: None,
            credentials: None,
        }
    }
}

impl<M> WsConnection<M> {
    /// See [`WsHandle::send`].
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> TransportResult<()> {
        self.handle.send(payload)
    }

    /// A handle for sending from other tasks.
    pub fn handle(&self) -> WsHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.handle.state.clone()
    }

    pub fn stats(&self) -> TransportStats {
        self.handle.stats()
    }

    pub fn url(&self) -> &str {
        &self.handle.url
    }

    /// Close the current connection and stop reconnecting.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("closing connection to {}", self.handle.url);
        }
    }

    /// Wait until the transport has reached [`ConnectionState::Stopped`].
    pub async fn stopped(&self) {
        let mut state = self.handle.state.clone();
        let _ = state.wait_for(ConnectionState::is_stopped).await;
    }
}

impl<M> Drop for WsConnection<M> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Builder for [`WsConnection`].
pub struct WsConnectionBuilder<M> {
    config: TransportConfig,
    pub(crate) handlers: Handlers<M>,
    connector: Option<Arc<dyn Connector>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl<M: Decode + Send + 'static> WsConnectionBuilder<M> {
    pub fn handlers(mut self, handlers: Handlers<M>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace the WebSocket connector.
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Append a credential to the URL on every attempt.
    pub fn credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut TransportConfig {
        &mut self.config
    }

    /// Validate the endpoint and start the driver task.
    pub fn spawn(self) -> Result<WsConnection<M>, ConfigError> {
        let endpoint: Url = self.config.endpoint()?;
        let (sender, commands) = unbounded();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting { attempt: 0 });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(StatsCounters::default());

        let handle = WsHandle {
            sender,
            state: state_rx,
            stats: stats.clone(),
            url: endpoint.to_string(),
        };

        let driver = Driver {
            endpoint,
            reconnect_delay: self.config.reconnect_delay,
            connect_timeout: self.config.connect_timeout,
            credential_param: self.config.credential_param,
            handlers: self.handlers,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TungsteniteConnector)),
            credentials: self.credentials,
            state: state_tx,
            stats,
        };
        tokio::spawn(driver.run(commands, shutdown_rx));

        Ok(WsConnection {
            handle,
            shutdown,
            _message: PhantomData,
        })
    }
}
