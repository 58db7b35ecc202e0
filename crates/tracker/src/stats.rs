use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregates over the retained window.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate_percent: f64,
    pub cache_hits: u64,
    pub cache_hit_rate_percent: f64,
    /// Mean latency of requests that went upstream.
    pub average_latency_ms: f64,
    pub rate_limit_hits: u64,
    pub unique_keys: usize,
    pub in_flight: usize,
    pub retention_hours: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSummary {
    pub total_hits: u64,
    pub hits_by_reason: BTreeMap<String, u64>,
    pub hits_by_key: BTreeMap<String, u64>,
    pub average_wait_seconds: f64,
    pub max_wait_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyStats {
    pub key: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub average_latency_ms: f64,
    pub rate_limit_hits: u64,
    pub last_request_at: Option<DateTime<Utc>>,
}

impl KeyStats {
    pub(crate) fn empty(key: &str) -> Self {
        Self {
            key: key.to_string(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            cache_hits: 0,
            average_latency_ms: 0.0,
            rate_limit_hits: 0,
            last_request_at: None,
        }
    }
}

pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let value = part as f64 / whole as f64 * 100.0;
    (value * 100.0).round() / 100.0
}

pub(crate) fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let value = sum / count as f64;
    (value * 100.0).round() / 100.0
}
