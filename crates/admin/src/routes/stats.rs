use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Returns the comprehensive statistics of every service component plus
/// the admin server's uptime.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    let stats = state.service.comprehensive_stats();

    match serde_json::to_value(&stats) {
        Ok(mut value) => {
            value["uptime_secs"] = json!(uptime_secs);
            Json(value)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize stats");
            Json(json!({ "error": "serialization failed" }))
        }
    }
}
