mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use market_cache_service::RateLimitedCacheService;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::RuntimeConfig;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .init();

    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/market-cache.yaml".to_string());

    info!(config_path = %config_path, "starting market data cache");

    let runtime_config = RuntimeConfig::load(&config_path)?;
    let app_config = runtime_config.config;
    info!(
        config_path = %runtime_config.config_path.display(),
        admin_listen = %app_config.server.admin_listen,
        "configuration loaded"
    );

    // One service instance for the whole process, shared by handle.
    let service = Arc::new(RateLimitedCacheService::new(app_config.clone()));
    service.start_background_tasks();

    let sweeper = Arc::clone(&service);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = sweeper.purge_expired_cache();
            debug!(purged, "cache sweep tick completed");
        }
    });

    let state = market_cache_admin::new_shared_state(Arc::clone(&service));
    let listen_addr = app_config.server.admin_listen.clone();

    tokio::select! {
        result = market_cache_admin::run_admin_server(state, &listen_addr) => {
            if let Err(e) = result {
                error!(error = %e, "admin API server error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("market data cache stopped");
    Ok(())
}
