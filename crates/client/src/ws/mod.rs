//! WebSocket transport for the change stream.
//!
//! This module provides:
//! - A managed connection with a fixed-delay auto-reconnect loop
//! - Decoding of inbound frames at the transport boundary
//! - Pluggable connectors, so the loop can be driven without a network
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   send()    ┌──────────────────────┐
//! │        WsConnection<M>       │────────────►│   Driver (tokio task) │
//! │  state / stats / close()     │◄────────────│  connect ─ serve ─    │
//! └──────────────────────────────┘ watch state │  close ─ wait ─ ...   │
//!                                              └──────────────────────┘
//!                                                  │            │
//!                                                  ▼            ▼
//!                                            ┌──────────┐ ┌────────────┐
//!                                            │Connector │ │ Handlers<M>│
//!                                            │(ws/mock) │ │ callbacks  │
//!                                            └──────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let handlers = Handlers::new()
//!     .on_open(|| tracing::info!("open"))
//!     .on_message(|event: ChangeEvent| println!("{event:?}"));
//! let conn = WsConnection::connect(TransportConfig::new("ws://localhost:8080/api/ws"), handlers)?;
//! // ...
//! conn.close();
//! ```

mod connection;
mod connector;
mod driver;
mod mock;

pub use connection::{
    ConnectionState, Handlers, TransportStats, WsConnection, WsConnectionBuilder, WsHandle,
};
pub use connector::{
    CloseInfo, Connector, Frame, FrameSink, FrameStream, SocketPair, TungsteniteConnector,
};
pub use mock::{Attempt, MockConnector, MockPeer, MockPeers};
