//! Livetable relay server
//!
//! Serves item snapshots over HTTP and fans published change events out to
//! every connected WebSocket client. Intended for development and tests.

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use state::AppState;

/// Build the relay's router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Items
        .route("/api/items", get(routes::items::list_items))
        .route("/api/items", post(routes::items::create_item))
        // Events
        .route("/api/events", post(routes::events::publish_event))
        // WebSocket
        .route("/api/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
