//! Change-event publishing.

use axum::{extract::State, http::StatusCode, Json};
use livetable_shared::ChangeEvent;

use crate::state::AppState;

/// Apply a change event to the relay and fan it out to every stream.
///
/// The body is validated by `ChangeEvent`'s deserializer, so malformed events
/// are rejected by the extractor before they reach the collection.
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<ChangeEvent>,
) -> StatusCode {
    tracing::info!("publishing {} for {:?}", event.kind(), event.keys());
    state.publish(event).await;
    StatusCode::ACCEPTED
}
