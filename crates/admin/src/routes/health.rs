use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/health
///
/// Runs the service health check and adds uptime and version.
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let report = state.service.health_check();
    let status = if report.overall_healthy { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "report": report
    }))
}
