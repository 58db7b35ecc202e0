use std::time::Instant;

use chrono::{DateTime, Utc};

/// A request that has started but not yet been reported back.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    pub key: String,
    pub category: String,
    pub started_at: Instant,
    pub timestamp: DateTime<Utc>,
}

/// A finalized request outcome.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: String,
    pub key: String,
    pub category: String,
    pub started_at: Instant,
    /// Set under the history lock, so records are ordered by it.
    pub completed_at: Instant,
    pub timestamp: DateTime<Utc>,
    pub succeeded: bool,
    pub latency_ms: f64,
    pub served_from_cache: bool,
}

/// A rejection by the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitHit {
    pub key: String,
    pub category: String,
    pub reason: String,
    pub wait_seconds: f64,
    pub at: Instant,
    pub timestamp: DateTime<Utc>,
}
