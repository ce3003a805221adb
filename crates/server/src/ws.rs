//! WebSocket handler for the change stream.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use livetable_shared::{ChangeEvent, USER_ID};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler. `?userId=` limits the stream to that user.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = query.user_id.filter(|id| !id.is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Whether `event` belongs on a stream scoped to `user_id`. Events that name
/// no user go to everyone.
fn visible_to(event: &ChangeEvent, user_id: Option<&str>) -> bool {
    let Some(user_id) = user_id else {
        return true;
    };
    match (event.keys().get(USER_ID), event) {
        (Some(owner), _) => owner == user_id,
        (None, ChangeEvent::Insert { item, .. }) => item.user_id == user_id,
        (None, _) => true,
    }
}

/// Stream published events to one client until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();
    tracing::info!("stream client connected (user {:?})", user_id);

    // Task to forward events to the WebSocket
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("stream client lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !visible_to(&event, user_id.as_deref()) {
                continue;
            }
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to encode event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Main receive loop
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    tracing::debug!("ignoring client frame: {}", text.as_str());
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!("stream client read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!("stream client disconnected");
}
