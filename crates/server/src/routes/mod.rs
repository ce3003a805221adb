//! API route handlers.

pub mod events;
pub mod items;
