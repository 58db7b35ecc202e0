use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Build the composite store key for a symbol within a category.
///
/// Only case is folded. Whitespace is kept as-is, so callers must pass
/// already-trimmed symbols or they will miss each other's entries.
pub fn cache_key(symbol: &str, category: &str) -> String {
    format!("{}:{}", category, symbol.to_uppercase())
}

/// A stored response. Immutable once built; updates replace the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// Case-folded symbol.
    pub symbol: String,
    pub category: String,
    pub payload: Arc<serde_json::Value>,
    pub stored_at: Instant,
    pub cached_at: DateTime<Utc>,
    pub ttl: Duration,
    /// Serialized payload length plus key length, fixed at insert time.
    pub size_bytes: usize,
}

impl CacheEntry {
    pub(crate) fn new(
        symbol: &str,
        category: &str,
        payload: serde_json::Value,
        ttl: Duration,
        payload_bytes: usize,
    ) -> Self {
        let key = cache_key(symbol, category);
        let size_bytes = payload_bytes + key.len();
        Self {
            symbol: symbol.to_uppercase(),
            category: category.to_string(),
            key,
            payload: Arc::new(payload),
            stored_at: Instant::now(),
            cached_at: Utc::now(),
            ttl,
            size_bytes,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_folds_case_but_keeps_whitespace() {
        assert_eq!(cache_key("aapl", "quote"), "quote:AAPL");
        assert_eq!(cache_key(" 2330", "quote"), "quote: 2330");
        assert_ne!(cache_key("2330", "quote"), cache_key("2330", "statement"));
    }

    #[test]
    fn size_includes_key() {
        let entry = CacheEntry::new("2330", "quote", json!({"price": 500}), Duration::from_secs(30), 13);
        assert_eq!(entry.key, "quote:2330");
        assert_eq!(entry.size_bytes, 13 + "quote:2330".len());
    }

    #[test]
    fn expiry_boundary() {
        let mut entry = CacheEntry::new("x", "quote", json!(1), Duration::from_secs(5), 1);
        let now = Instant::now();
        entry.stored_at = now - Duration::from_secs(4);
        assert!(!entry.is_expired_at(now));
        entry.stored_at = now - Duration::from_secs(5);
        assert!(entry.is_expired_at(now));
    }
}
