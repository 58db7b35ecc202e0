use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/cache/keys
///
/// Lists the symbols that currently have a live cache entry.
pub async fn list_keys(State(state): State<SharedState>) -> Json<Value> {
    let keys = state.service.cached_keys();
    Json(json!({
        "total": keys.len(),
        "keys": keys
    }))
}

/// DELETE /api/cache/{category}/{key}
///
/// Invalidates one entry. Returns 404 if nothing was cached for it.
pub async fn invalidate(
    State(state): State<SharedState>,
    Path((category, key)): Path<(String, String)>,
) -> impl IntoResponse {
    if state.service.invalidate_key(&key, &category) {
        (
            StatusCode::OK,
            Json(json!({
                "status": "invalidated",
                "category": category,
                "key": key
            })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "message": format!("no cache entry for {}:{}", category, key)
            })),
        )
    }
}

/// DELETE /api/cache
///
/// Drops every cache entry.
pub async fn clear(State(state): State<SharedState>) -> Json<Value> {
    state.service.clear_all_cache();
    tracing::info!("cache cleared via admin API");
    Json(json!({ "status": "cleared" }))
}
