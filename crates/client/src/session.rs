//! Seed, stream, reduce, present.
//!
//! A [`SyncSession`] fetches the baseline collection once, then opens the
//! change stream and folds every decoded event into it. Consumers observe the
//! latest collection through a watch channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use livetable_shared::{ChangeEvent, Collection, ReducerConfig, USER_ID};
use tokio::sync::watch;

use crate::config::TransportConfig;
use crate::credentials::CredentialProvider;
use crate::error::ClientError;
use crate::snapshot::SnapshotSource;
use crate::ws::{
    ConnectionState, Connector, Handlers, TransportStats, WsConnection, WsConnectionBuilder,
};

/// A running snapshot-plus-stream session.
pub struct SyncSession {
    connection: WsConnection<ChangeEvent>,
    collection: watch::Receiver<Arc<Collection>>,
    applied: Arc<AtomicU64>,
}

impl SyncSession {
    pub fn builder(config: TransportConfig) -> SyncSessionBuilder {
        SyncSessionBuilder {
            transport: WsConnection::builder(config),
            reducer: ReducerConfig::default(),
        }
    }

    /// The current collection.
    pub fn current(&self) -> Arc<Collection> {
        self.collection.borrow().clone()
    }

    /// A receiver notified after every applied event.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Collection>> {
        self.collection.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_changes()
    }

    pub fn stats(&self) -> TransportStats {
        self.connection.stats()
    }

    pub fn connection(&self) -> &WsConnection<ChangeEvent> {
        &self.connection
    }

    /// Number of events folded into the collection so far.
    pub fn events_applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Stop the stream. The collection keeps its last value.
    pub fn close(&self) {
        self.connection.close();
    }

    pub async fn stopped(&self) {
        self.connection.stopped().await;
    }
}

pub struct SyncSessionBuilder {
    transport: WsConnectionBuilder<ChangeEvent>,
    reducer: ReducerConfig,
}

impl SyncSessionBuilder {
    /// Extra callbacks. `on_message` runs after the event has been applied.
    pub fn handlers(mut self, handlers: Handlers<ChangeEvent>) -> Self {
        self.transport = self.transport.handlers(handlers);
        self
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.transport = self.transport.connector(connector);
        self
    }

    pub fn credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.transport = self.transport.credentials(provider);
        self
    }

    pub fn reducer(mut self, reducer: ReducerConfig) -> Self {
        self.reducer = reducer;
        self
    }

    /// Fetch the snapshot for `identity`, then open the stream scoped to the
    /// same user through a `userId` query parameter.
    ///
    /// Events are only applied on top of the fetched snapshot; nothing that
    /// arrives on the stream can be lost to a late seed.
    pub async fn start(
        self,
        source: &dyn SnapshotSource,
        identity: &str,
    ) -> Result<SyncSession, ClientError> {
        let SyncSessionBuilder {
            mut transport,
            reducer,
        } = self;
        if !identity.is_empty() {
            // the relay only streams this user's events
            transport
                .config_mut()
                .query
                .push((USER_ID.to_string(), identity.to_string()));
        }
        // fail fast before the snapshot request
        transport.config().endpoint()?;

        let items = source.fetch(identity).await?;
        tracing::info!("seeded session with {} items", items.len());

        let (tx, collection) = watch::channel(Arc::new(Collection::from(items)));
        let applied = Arc::new(AtomicU64::new(0));

        let user_message = transport.handlers.on_message.take();
        let counter = applied.clone();
        transport.handlers.on_message = Some(Box::new(move |event: ChangeEvent| {
            tx.send_modify(|current| {
                *current = Arc::new(current.apply(&event, &reducer));
            });
            counter.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("applied {} event", event.kind());
            if let Some(f) = &user_message {
                f(event);
            }
        }));

        let connection = transport.spawn()?;
        Ok(SyncSession {
            connection,
            collection,
            applied,
        })
    }
}
