//! Multi-layer rate limiting for the upstream market-data source.
//!
//! Three independent constraints sit behind a single [`RateLimiter`] facade:
//!
//! - **Per key** -- at most one accepted fetch per key every
//!   `per_key_interval` (see [`PerKeyLimiter`]).
//!
//! - **Global per minute** -- a sliding window log of every accepted fetch
//!   over the last 60 seconds (see [`SlidingWindowLog`]).
//!
//! - **Global per second** -- the same log over a 1 second window, which
//!   smooths bursts the minute budget alone would still allow.
//!
//! Checking never consumes budget. Only [`RateLimiter::record_request`] does,
//! and each structure is updated under its own lock.

pub mod per_key;
pub mod sliding_window;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use market_cache_common::RateLimitConfig;
use serde::Serialize;

pub use per_key::PerKeyLimiter;
pub use sliding_window::SlidingWindowLog;

const MINUTE: Duration = Duration::from_secs(60);
const SECOND: Duration = Duration::from_secs(1);

/// The constraint that rejected a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitReason {
    /// The key itself was fetched less than one interval ago.
    KeyInterval { key: String },
    /// The global per-minute budget is spent.
    GlobalPerMinute,
    /// The global per-second budget is spent.
    PerSecond,
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitReason::KeyInterval { key } => write!(f, "stock_limit_exceeded_for_{}", key),
            LimitReason::GlobalPerMinute => f.write_str("global_limit_exceeded"),
            LimitReason::PerSecond => f.write_str("per_second_limit_exceeded"),
        }
    }
}

/// Outcome of [`RateLimiter::can_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// The most restrictive failing constraint; `None` when allowed.
    pub reason: Option<LimitReason>,
    /// Advisory backoff before the request could pass.
    pub wait: Duration,
    /// Set when limiting is switched off and nothing was checked.
    pub bypassed: bool,
}

impl RateLimitDecision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            wait: Duration::ZERO,
            bypassed: false,
        }
    }

    /// Verdict used when rate limiting is disabled.
    pub fn disabled() -> Self {
        Self {
            bypassed: true,
            ..Self::allowed()
        }
    }

    /// Machine-readable reason: the failing constraint, `allowed`, or
    /// `rate_limiting_disabled`.
    pub fn reason_code(&self) -> String {
        match &self.reason {
            Some(reason) => reason.to_string(),
            None if self.bypassed => "rate_limiting_disabled".to_string(),
            None => "allowed".to_string(),
        }
    }

    pub fn wait_seconds(&self) -> f64 {
        self.wait.as_secs_f64()
    }
}

/// Point-in-time view of the limiter.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub global_requests_last_minute: usize,
    pub global_limit_per_minute: usize,
    pub requests_last_second: usize,
    pub per_second_limit: usize,
    pub tracked_keys_count: usize,
    pub per_key_interval_seconds: f64,
}

/// Combined per-key, per-minute and per-second limiter.
///
/// Cheaply cloneable (backed by `Arc`) and safe to share across tasks and
/// threads. It knows nothing about the cache; serving stale data on
/// rejection is decided one layer up.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    per_key: PerKeyLimiter,
    per_minute: SlidingWindowLog,
    per_second: SlidingWindowLog,
}

impl RateLimiter {
    /// * `per_key_interval` - minimum spacing between fetches of one key
    /// * `per_minute`       - accepted fetches allowed in any 60 s window
    /// * `per_second`       - accepted fetches allowed in any 1 s window
    pub fn new(per_key_interval: Duration, per_minute: usize, per_second: usize) -> Self {
        tracing::info!(
            per_key_interval_secs = per_key_interval.as_secs_f64(),
            per_minute,
            per_second,
            "creating multi-layer rate limiter"
        );
        Self {
            inner: Arc::new(RateLimiterInner {
                per_key: PerKeyLimiter::new(per_key_interval),
                per_minute: SlidingWindowLog::new(per_minute, MINUTE, "per-minute window"),
                per_second: SlidingWindowLog::new(per_second, SECOND, "per-second window"),
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let interval =
            Duration::try_from_secs_f64(config.per_key_interval_secs).unwrap_or(Duration::ZERO);
        Self::new(
            interval,
            config.global_limit_per_minute,
            config.per_second_limit,
        )
    }

    /// Check all three constraints for `key` without consuming any budget.
    ///
    /// When rejected, the reported reason is the constraint with the longest
    /// wait. Equal waits resolve per-key first, then per-minute, then
    /// per-second.
    pub fn can_request(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let (key_ok, key_wait) = self.inner.per_key.check_at(key, now);
        let (minute_ok, minute_wait) = self.inner.per_minute.check_at(now);
        let (second_ok, second_wait) = self.inner.per_second.check_at(now);

        if key_ok && minute_ok && second_ok {
            return RateLimitDecision::allowed();
        }

        let max_wait = key_wait.max(minute_wait).max(second_wait);
        let reason = if !key_ok && key_wait == max_wait {
            LimitReason::KeyInterval {
                key: key.to_string(),
            }
        } else if !minute_ok && minute_wait == max_wait {
            LimitReason::GlobalPerMinute
        } else {
            LimitReason::PerSecond
        };

        tracing::debug!(
            key,
            reason = %reason,
            wait_secs = max_wait.as_secs_f64(),
            "rate limit rejected request"
        );

        RateLimitDecision {
            allowed: false,
            reason: Some(reason),
            wait: max_wait,
            bypassed: false,
        }
    }

    /// Consume one unit of every budget for `key`.
    pub fn record_request(&self, key: &str) {
        self.inner.per_key.record(key);
        self.inner.per_minute.record();
        self.inner.per_second.record();
        tracing::debug!(key, "recorded upstream request");
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            global_requests_last_minute: self.inner.per_minute.count(),
            global_limit_per_minute: self.inner.per_minute.limit(),
            requests_last_second: self.inner.per_second.count(),
            per_second_limit: self.inner.per_second.limit(),
            tracked_keys_count: self.inner.per_key.tracked_keys(),
            per_key_interval_seconds: self.inner.per_key.interval().as_secs_f64(),
        }
    }

    /// Forget every recorded request. Use with care: the upstream quota
    /// keeps counting even if we do not.
    pub fn reset_limits(&self) {
        self.inner.per_key.reset();
        self.inner.per_minute.reset();
        self.inner.per_second.reset();
        tracing::info!("rate limit counters reset");
    }

    /// Spawn a background thread that periodically drops per-key entries
    /// whose interval has elapsed.
    ///
    /// The thread runs every 60 seconds for the lifetime of the process and
    /// keeps the limiter state alive through its `Arc`.
    pub fn start_cleanup_task(&self) {
        let inner = Arc::clone(&self.inner);

        let spawned = std::thread::Builder::new()
            .name("rate-limit-cleanup".into())
            .spawn(move || loop {
                std::thread::sleep(MINUTE);
                inner.per_key.cleanup();
                tracing::trace!("rate limiter cleanup tick completed");
            });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn rate-limit cleanup thread");
        }
    }
}

impl From<&RateLimitConfig> for RateLimiter {
    fn from(config: &RateLimitConfig) -> Self {
        Self::from_config(config)
    }
}
