use market_cache_common::{CacheConfig, MonitoringConfig, RateLimitConfig};
use market_cache_rate_limit::RateLimiterStats;
use market_cache_store::CacheStats;
use market_cache_tracker::{GlobalStats, KeyStats, RateLimitSummary};
use serde::Serialize;

use crate::health::ComponentHealth;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub enabled: bool,
    pub rate_limiting_enabled: bool,
    pub caching_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackerReport {
    pub global: GlobalStats,
    pub rate_limits: RateLimitSummary,
    pub top_keys: Vec<KeyStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationView {
    pub rate_limiting: RateLimitConfig,
    pub caching: CacheConfig,
    pub monitoring: MonitoringConfig,
}

/// Snapshot of every component, as served by the admin stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveStats {
    pub service_status: ServiceStatus,
    pub rate_limiter: RateLimiterStats,
    pub cache_manager: CacheStats,
    pub request_tracker: TrackerReport,
    pub cache_health: ComponentHealth,
    pub configuration: ConfigurationView,
}
