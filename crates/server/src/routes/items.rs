//! Item routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use livetable_shared::{ChangeEvent, Item};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub project_id: String,
    pub user_id: String,
    pub name: String,
}

/// List the current items, all of them or those of `?userId=`
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> Json<Vec<Item>> {
    let user_id = query.user_id.as_deref().filter(|id| !id.is_empty());
    Json(state.snapshot(user_id).await)
}

/// Create an item and publish it as an INSERT
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), (StatusCode, String)> {
    if payload.project_id.is_empty() || payload.user_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "projectId and userId are required".to_string(),
        ));
    }

    let item = Item::new(
        payload.project_id,
        payload.user_id,
        chrono::Utc::now().to_rfc3339(),
        payload.name,
    );
    tracing::info!("creating item {}/{}", item.project_id, item.user_id);
    state.publish(ChangeEvent::insert(item.clone())).await;

    Ok((StatusCode::CREATED, Json(item)))
}
