//! Application state shared across request handlers.

use std::sync::Arc;

use livetable_shared::{ChangeEvent, Collection, Item, ReducerConfig};
use tokio::sync::{broadcast, RwLock};

const CHANNEL_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    items: Arc<RwLock<Collection>>,
    events: broadcast::Sender<ChangeEvent>,
    reducer: ReducerConfig,
}

impl AppState {
    pub fn new(reducer: ReducerConfig) -> Self {
        let (events, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            items: Arc::new(RwLock::new(Collection::new())),
            events,
            reducer,
        }
    }

    /// Start from a fixed set of items.
    pub fn with_items(self, items: Vec<Item>) -> Self {
        Self {
            items: Arc::new(RwLock::new(Collection::from(items))),
            ..self
        }
    }

    /// Current items, optionally only those of one user.
    pub async fn snapshot(&self, user_id: Option<&str>) -> Vec<Item> {
        let items = self.items.read().await;
        items
            .iter()
            .filter(|item| user_id.map_or(true, |id| item.user_id == id))
            .cloned()
            .collect()
    }

    /// Fold `event` into the relay's collection and fan it out. Returns the
    /// number of subscribers it reached.
    ///
    /// The write lock is held across the broadcast so subscribers observe
    /// events in the order they were applied.
    pub async fn publish(&self, event: ChangeEvent) -> usize {
        let mut items = self.items.write().await;
        *items = items.apply(&event, &self.reducer);
        let reached = self.events.send(event).unwrap_or(0);
        tracing::debug!("published event to {} subscribers", reached);
        reached
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Number of connected stream clients.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}
