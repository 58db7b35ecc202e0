//! Rate-limited caching decisions for the upstream market-data source.
//!
//! [`RateLimitedCacheService`] composes the rate limiter, the cache and the
//! request tracker behind one decision API. It never fetches anything itself:
//! callers ask [`RateLimitedCacheService::get_cached_or_wait`], fetch
//! upstream only when told they may, and report the outcome back.
//!
//! Build one instance at startup and share it (e.g. behind an `Arc`). Every
//! operation is synchronous and short; each component guards its own state,
//! and no lock is held across components.

pub mod decision;
pub mod health;
pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};

use market_cache_common::AppConfig;
use market_cache_rate_limit::{RateLimitDecision, RateLimiter};
use market_cache_store::CacheManager;
use market_cache_tracker::RequestTracker;
use tracing::{debug, info};

pub use decision::CacheDecision;
pub use health::{ComponentHealth, HealthComponents, HealthReport};
pub use stats::{ComprehensiveStats, ConfigurationView, ServiceStatus, TrackerReport};

const MIN_SUCCESS_RATE_PERCENT: f64 = 90.0;
/// Tracked requests required before success and hit rates are judged.
const MIN_REQUESTS_FOR_RATES: u64 = 10;
const GLOBAL_USAGE_WARN_RATIO: f64 = 0.9;
const TOP_KEYS_IN_STATS: usize = 5;

pub struct RateLimitedCacheService {
    rate_limiter: RateLimiter,
    cache: CacheManager,
    tracker: RequestTracker,
    config: AppConfig,
    enabled: AtomicBool,
}

impl RateLimitedCacheService {
    pub fn new(config: AppConfig) -> Self {
        info!(
            rate_limiting = config.rate_limit.enabled,
            caching = config.cache.enabled,
            "creating rate-limited cache service"
        );
        Self {
            rate_limiter: RateLimiter::from_config(&config.rate_limit),
            cache: CacheManager::from_config(&config.cache)
                .with_hit_rate_target(config.monitoring.cache_hit_rate_target_percent),
            tracker: RequestTracker::from_config(&config.monitoring),
            config,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start background maintenance for the rate limiter.
    pub fn start_background_tasks(&self) {
        self.rate_limiter.start_cleanup_task();
    }

    fn caching_enabled(&self) -> bool {
        self.config.cache.enabled
    }

    fn rate_limiting_enabled(&self) -> bool {
        self.config.rate_limit.enabled
    }

    /// Ask the rate limiter alone. Consumes no budget.
    pub fn can_make_request(&self, key: &str) -> RateLimitDecision {
        if !self.rate_limiting_enabled() {
            return RateLimitDecision::disabled();
        }
        self.rate_limiter.can_request(key)
    }

    /// Decide how to answer a request for `key` in `category`.
    ///
    /// The cache is consulted even when a fetch would be allowed, and a
    /// cached entry never suppresses the permission: an allowed request with
    /// a live entry yields [`CacheDecision::CacheHit`]. Under rate limiting a
    /// cached entry is served instead of failing.
    pub fn get_cached_or_wait(&self, key: &str, category: &str) -> CacheDecision {
        let cached = if self.caching_enabled() {
            self.cache.get_cached_data(key, category)
        } else {
            None
        };

        let verdict = self.can_make_request(key);

        let decision = if verdict.allowed {
            match cached {
                Some(entry) => CacheDecision::CacheHit { entry },
                None => CacheDecision::FetchPermitted,
            }
        } else {
            let reason = verdict.reason_code();
            self.tracker
                .record_rate_limit_hit(key, &reason, verdict.wait_seconds(), category);
            match cached {
                Some(entry) => CacheDecision::RateLimitedCache {
                    entry,
                    reason,
                    wait: verdict.wait,
                },
                None => CacheDecision::RateLimitedNoCache {
                    reason,
                    wait: verdict.wait,
                },
            }
        };

        debug!(key, category, outcome = %decision.message(), "cache decision");
        decision
    }

    /// Report a successful upstream fetch.
    ///
    /// Consumes rate-limit budget for `key`, caches `payload` (best effort)
    /// and records the request. Returns whether the payload was cached; a
    /// refused cache write does not fail the call.
    pub fn record_successful_request(
        &self,
        key: &str,
        payload: serde_json::Value,
        latency_ms: f64,
        category: &str,
    ) -> bool {
        self.rate_limiter.record_request(key);

        let cached = if self.caching_enabled() {
            self.cache.set_cached_data(key, category, payload)
        } else {
            true
        };

        let id = self.tracker.record_request_start(key, category);
        self.tracker
            .record_request_complete(&id, key, true, latency_ms, false, category);

        debug!(key, category, latency_ms, cached, "recorded successful request");
        cached
    }

    /// Report a failed upstream fetch. Statistics only: a failure consumes no
    /// rate-limit budget.
    pub fn record_failed_request(&self, key: &str, latency_ms: f64, category: &str) {
        let id = self.tracker.record_request_start(key, category);
        self.tracker
            .record_request_complete(&id, key, false, latency_ms, false, category);
        debug!(key, category, latency_ms, "recorded failed request");
    }

    /// Report that a cached entry was served. Statistics only.
    pub fn record_cached_response(&self, key: &str, category: &str) {
        let id = self.tracker.record_request_start(key, category);
        self.tracker
            .record_request_complete(&id, key, true, 0.0, true, category);
        debug!(key, category, "recorded cached response");
    }

    pub fn invalidate_key(&self, key: &str, category: &str) -> bool {
        if !self.caching_enabled() {
            return true;
        }
        let removed = self.cache.invalidate(key, category);
        info!(key, category, removed, "cache invalidation requested");
        removed
    }

    pub fn clear_all_cache(&self) {
        if self.caching_enabled() {
            self.cache.clear_all();
        }
    }

    /// Evict expired cache entries ahead of their next read.
    pub fn purge_expired_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.cached_keys()
    }

    pub fn reset_rate_limits(&self) {
        self.rate_limiter.reset_limits();
    }

    /// Clear the cache, the rate limits and every statistic.
    pub fn reset_all_stats(&self) {
        self.clear_all_cache();
        self.rate_limiter.reset_limits();
        self.tracker.reset_stats();
        info!("all statistics and cache reset");
    }

    pub fn enable_service(&self) {
        self.enabled.store(true, Ordering::Relaxed);
        info!("rate-limited cache service enabled");
    }

    pub fn disable_service(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        info!("rate-limited cache service disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn comprehensive_stats(&self) -> ComprehensiveStats {
        let (_, cache_issues) = self.cache.is_cache_healthy();
        ComprehensiveStats {
            service_status: ServiceStatus {
                enabled: self.is_enabled(),
                rate_limiting_enabled: self.rate_limiting_enabled(),
                caching_enabled: self.caching_enabled(),
            },
            rate_limiter: self.rate_limiter.stats(),
            cache_manager: self.cache.cache_stats(),
            request_tracker: TrackerReport {
                global: self.tracker.global_stats(),
                rate_limits: self.tracker.rate_limit_summary(),
                top_keys: self.tracker.top_keys(TOP_KEYS_IN_STATS),
            },
            cache_health: ComponentHealth::from_issues(cache_issues),
            configuration: ConfigurationView {
                rate_limiting: self.config.rate_limit.clone(),
                caching: self.config.cache.clone(),
                monitoring: self.config.monitoring.clone(),
            },
        }
    }

    pub fn health_check(&self) -> HealthReport {
        let (_, cache_issues) = self.cache.is_cache_healthy();
        let cache = ComponentHealth::from_issues(cache_issues);

        let limiter_stats = self.rate_limiter.stats();
        let mut limiter_issues = Vec::new();
        if limiter_stats.global_requests_last_minute as f64
            > limiter_stats.global_limit_per_minute as f64 * GLOBAL_USAGE_WARN_RATIO
        {
            limiter_issues.push("Approaching global rate limit".to_string());
        }
        let rate_limiter = ComponentHealth::from_issues(limiter_issues);

        let target = self.config.monitoring.cache_hit_rate_target_percent;
        let global = self.tracker.global_stats();
        let mut tracker_issues = Vec::new();
        if global.total_requests > MIN_REQUESTS_FOR_RATES {
            if global.success_rate_percent < MIN_SUCCESS_RATE_PERCENT {
                tracker_issues.push(format!(
                    "Low success rate: {}%",
                    global.success_rate_percent
                ));
            }
            if global.cache_hit_rate_percent < target {
                tracker_issues.push(format!(
                    "Low cache hit rate: {}% (target: {}%)",
                    global.cache_hit_rate_percent, target
                ));
            }
        }
        let request_tracker = ComponentHealth::from_issues(tracker_issues);

        let mut recommendations = Vec::new();
        if !cache.healthy {
            recommendations.push("Consider increasing cache size or memory limit".to_string());
        }
        if !rate_limiter.healthy {
            recommendations.push("Consider adjusting rate limits or request patterns".to_string());
        }
        if global.cache_hit_rate_percent < target {
            recommendations
                .push("Optimize cache TTL or request patterns to improve hit rate".to_string());
        }

        let mut report = HealthReport::new(HealthComponents {
            cache,
            rate_limiter,
            request_tracker,
        });
        report.recommendations = recommendations;

        if !report.overall_healthy {
            tracing::warn!(issues = ?report.issues, "health check found issues");
        }
        report
    }
}
