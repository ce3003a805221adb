//! Shared types for livetable clients and the relay server.
//!
//! The item and change-event schema both sides agree on, the wire decoder
//! that validates inbound frames, and the reducer that folds change events
//! into a [`Collection`].

pub mod error;
pub mod models;
pub mod protocol;
pub mod reducer;

pub use error::*;
pub use models::*;
pub use protocol::*;
pub use reducer::*;
