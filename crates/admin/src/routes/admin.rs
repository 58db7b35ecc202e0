use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// POST /api/rate-limits/reset
pub async fn reset_rate_limits(State(state): State<SharedState>) -> Json<Value> {
    state.service.reset_rate_limits();
    tracing::warn!("rate limits reset via admin API");
    Json(json!({ "status": "reset" }))
}

/// POST /api/stats/reset
///
/// Clears the cache, the rate limits and all request statistics.
pub async fn reset_all_stats(State(state): State<SharedState>) -> Json<Value> {
    state.service.reset_all_stats();
    tracing::warn!("all statistics reset via admin API");
    Json(json!({ "status": "reset" }))
}

/// POST /api/service/enable
pub async fn enable_service(State(state): State<SharedState>) -> Json<Value> {
    state.service.enable_service();
    Json(json!({ "enabled": true }))
}

/// POST /api/service/disable
pub async fn disable_service(State(state): State<SharedState>) -> Json<Value> {
    state.service.disable_service();
    Json(json!({ "enabled": false }))
}
