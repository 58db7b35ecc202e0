use std::sync::Arc;

use market_cache_service::{ComprehensiveStats, RateLimitedCacheService};
use prometheus::{Gauge, IntGauge, Opts, Registry};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Central application state: the service handle, metrics and uptime.
pub struct AppState {
    pub service: Arc<RateLimitedCacheService>,
    pub metrics: ServiceMetrics,
    pub start_time: std::time::Instant,
}

/// Prometheus gauges mirroring the service statistics.
///
/// The service keeps its own counters (some of which reset), so these are
/// gauges refreshed from a stats snapshot at scrape time.
pub struct ServiceMetrics {
    pub registry: Registry,
    pub cache_entries: IntGauge,
    pub cache_hits: IntGauge,
    pub cache_misses: IntGauge,
    pub cache_memory_mb: Gauge,
    pub global_requests_last_minute: IntGauge,
    pub requests_last_second: IntGauge,
    pub tracked_keys: IntGauge,
    pub tracked_requests: IntGauge,
    pub success_rate_percent: Gauge,
    pub cache_hit_rate_percent: Gauge,
    pub rate_limit_hits: IntGauge,
    pub healthy: IntGauge,
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("failed to create {} gauge: {}", name, e));
    registry
        .register(Box::new(gauge.clone()))
        .unwrap_or_else(|e| panic!("failed to register {}: {}", name, e));
    gauge
}

fn float_gauge(registry: &Registry, name: &str, help: &str) -> Gauge {
    let gauge = Gauge::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("failed to create {} gauge: {}", name, e));
    registry
        .register(Box::new(gauge.clone()))
        .unwrap_or_else(|e| panic!("failed to register {}: {}", name, e));
    gauge
}

impl ServiceMetrics {
    /// Create all gauges against a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        Self {
            cache_entries: int_gauge(&registry, "market_cache_entries", "Live entries in the response cache"),
            cache_hits: int_gauge(&registry, "market_cache_hits", "Cache hits since the last clear"),
            cache_misses: int_gauge(&registry, "market_cache_misses", "Cache misses since the last clear"),
            cache_memory_mb: float_gauge(&registry, "market_cache_memory_mb", "Tracked cache payload size in MB"),
            global_requests_last_minute: int_gauge(
                &registry,
                "market_cache_upstream_requests_last_minute",
                "Upstream requests accepted in the last 60 seconds",
            ),
            requests_last_second: int_gauge(
                &registry,
                "market_cache_upstream_requests_last_second",
                "Upstream requests accepted in the last second",
            ),
            tracked_keys: int_gauge(&registry, "market_cache_rate_limited_keys", "Keys with an active per-key interval"),
            tracked_requests: int_gauge(&registry, "market_cache_tracked_requests", "Requests in the statistics window"),
            success_rate_percent: float_gauge(&registry, "market_cache_success_rate_percent", "Request success rate over the window"),
            cache_hit_rate_percent: float_gauge(
                &registry,
                "market_cache_served_from_cache_percent",
                "Share of tracked requests served from cache",
            ),
            rate_limit_hits: int_gauge(&registry, "market_cache_rate_limit_hits", "Rate-limit rejections over the window"),
            healthy: int_gauge(&registry, "market_cache_healthy", "1 when the last health check passed"),
            registry,
        }
    }

    /// Copy a stats snapshot into the gauges.
    pub fn refresh(&self, stats: &ComprehensiveStats, healthy: bool) {
        let cache = &stats.cache_manager;
        self.cache_entries.set(cache.cache_entries as i64);
        self.cache_hits.set(cache.hit_count as i64);
        self.cache_misses.set(cache.miss_count as i64);
        self.cache_memory_mb.set(cache.memory_usage_mb);

        let limiter = &stats.rate_limiter;
        self.global_requests_last_minute
            .set(limiter.global_requests_last_minute as i64);
        self.requests_last_second.set(limiter.requests_last_second as i64);
        self.tracked_keys.set(limiter.tracked_keys_count as i64);

        let global = &stats.request_tracker.global;
        self.tracked_requests.set(global.total_requests as i64);
        self.success_rate_percent.set(global.success_rate_percent);
        self.cache_hit_rate_percent.set(global.cache_hit_rate_percent);
        self.rate_limit_hits.set(global.rate_limit_hits as i64);

        self.healthy.set(i64::from(healthy));
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new(service: Arc<RateLimitedCacheService>) -> Self {
        Self {
            service,
            metrics: ServiceMetrics::new(),
            start_time: std::time::Instant::now(),
        }
    }
}
