//! Livetable client - real-time sync of an item table
//!
//! This crate seeds a collection from an HTTP snapshot, then keeps it current
//! by folding the change events pushed over an auto-reconnecting WebSocket.

pub mod config;
pub mod credentials;
pub mod error;
pub mod session;
pub mod snapshot;
pub mod ws;

pub use config::{SessionConfig, TransportConfig};
pub use credentials::{CredentialProvider, EnvCredential, StaticCredential};
pub use error::{ClientError, ConfigError, TransportError, TransportResult};
pub use session::{SyncSession, SyncSessionBuilder};
pub use snapshot::{HttpSnapshotSource, SnapshotSource, StaticSnapshot};
pub use ws::{CloseInfo, ConnectionState, Handlers, TransportStats, WsConnection, WsHandle};
