use std::time::Duration;

use market_cache_store::CacheEntry;

/// What a caller should do for one `(key, category)` request.
///
/// Rejections are ordinary values, not errors: they say "not now" and carry
/// an advisory wait, plus the cached entry when one was available.
#[derive(Debug, Clone)]
pub enum CacheDecision {
    /// A live entry exists and a fresh fetch would also be allowed. Serving
    /// the entry is the default; invalidate first to force a refresh.
    CacheHit { entry: CacheEntry },
    /// Nothing cached; the caller may fetch upstream and must report the
    /// outcome back.
    FetchPermitted,
    /// Rate limited, but a cached entry can be served instead.
    RateLimitedCache {
        entry: CacheEntry,
        reason: String,
        wait: Duration,
    },
    /// Rate limited with nothing to serve. `wait` is a retry-after hint.
    RateLimitedNoCache { reason: String, wait: Duration },
}

impl CacheDecision {
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            CacheDecision::CacheHit { entry } | CacheDecision::RateLimitedCache { entry, .. } => {
                Some(entry)
            }
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.entry().map(|entry| entry.payload.as_ref())
    }

    pub fn from_cache(&self) -> bool {
        self.entry().is_some()
    }

    /// Whether the rate limiter would accept an upstream fetch right now.
    pub fn fetch_allowed(&self) -> bool {
        matches!(
            self,
            CacheDecision::CacheHit { .. } | CacheDecision::FetchPermitted
        )
    }

    pub fn wait(&self) -> Duration {
        match self {
            CacheDecision::RateLimitedCache { wait, .. }
            | CacheDecision::RateLimitedNoCache { wait, .. } => *wait,
            _ => Duration::ZERO,
        }
    }

    /// Status message in the form consumers log and match on.
    pub fn message(&self) -> String {
        match self {
            CacheDecision::CacheHit { .. } => "cache_hit_but_can_make_new_request".to_string(),
            CacheDecision::FetchPermitted => "cache_miss_can_make_request".to_string(),
            CacheDecision::RateLimitedCache { reason, .. } => {
                format!("rate_limited_returned_cache_{}", reason)
            }
            CacheDecision::RateLimitedNoCache { reason, .. } => {
                format!("rate_limited_no_cache_{}", reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cache_rejection_carries_wait() {
        let decision = CacheDecision::RateLimitedNoCache {
            reason: "global_limit_exceeded".into(),
            wait: Duration::from_secs(12),
        };
        assert!(!decision.from_cache());
        assert!(!decision.fetch_allowed());
        assert!(decision.payload().is_none());
        assert_eq!(decision.wait(), Duration::from_secs(12));
        assert_eq!(decision.message(), "rate_limited_no_cache_global_limit_exceeded");
    }

    #[test]
    fn permitted_has_no_wait() {
        let decision = CacheDecision::FetchPermitted;
        assert!(decision.fetch_allowed());
        assert_eq!(decision.wait(), Duration::ZERO);
        assert_eq!(decision.message(), "cache_miss_can_make_request");
    }
}
