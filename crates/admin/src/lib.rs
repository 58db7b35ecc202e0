pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use market_cache_service::RateLimitedCacheService;
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

pub use state::{AppState, ServiceMetrics, SharedState as SharedStateType};

/// Build the Axum router with all admin API routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(routes::health::health_check))
        // Prometheus metrics
        .route("/api/metrics", get(routes::metrics::get_metrics))
        // Statistics
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/api/stats/reset", post(routes::admin::reset_all_stats))
        // Cache management
        .route("/api/cache", delete(routes::cache::clear))
        .route("/api/cache/keys", get(routes::cache::list_keys))
        .route("/api/cache/{category}/{key}", delete(routes::cache::invalidate))
        // Rate limits and service switch
        .route("/api/rate-limits/reset", post(routes::admin::reset_rate_limits))
        .route("/api/service/enable", post(routes::admin::enable_service))
        .route("/api/service/disable", post(routes::admin::disable_service))
        // Attach shared state and middleware
        .with_state(state)
        .layer(cors)
}

/// Start the admin API server on the specified address.
///
/// This function will block until the server is shut down.
pub async fn run_admin_server(state: SharedState, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("admin API server listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience function to create a SharedState around a service handle.
pub fn new_shared_state(service: Arc<RateLimitedCacheService>) -> SharedState {
    Arc::new(AppState::new(service))
}
