//! TTL-bounded response cache with a soft memory ceiling.
//!
//! Entries expire lazily: a read past `stored_at + ttl` counts as a miss and
//! evicts the stale entry on the spot. The entry count is capped by evicting
//! the least recently used entry, and once the tracked byte total exceeds the
//! configured ceiling new writes are refused while existing entries stay.

pub mod entry;
mod lru;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use market_cache_common::{lock_or_recover, CacheConfig, CacheError, CacheResult};
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub use entry::{cache_key, CacheEntry};
use lru::LruStore;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const DEFAULT_HIT_RATE_TARGET: f64 = 80.0;
/// Lookups required before a low hit rate is reported.
const MIN_LOOKUPS_FOR_HIT_RATE: u64 = 10;
const FULL_UTILIZATION_PERCENT: f64 = 95.0;

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
    pub cache_entries: usize,
    pub max_entries: usize,
    pub memory_usage_mb: f64,
    pub memory_limit_mb: f64,
    pub ttl_seconds: u64,
}

pub struct CacheManager {
    store: Mutex<LruStore>,
    hits: AtomicU64,
    misses: AtomicU64,
    ttl: Duration,
    max_entries: usize,
    max_memory_mb: f64,
    hit_rate_target: f64,
}

impl CacheManager {
    /// * `ttl`           - lifetime of every entry written with [`Self::set_cached_data`]
    /// * `max_entries`   - entry count cap, enforced by LRU eviction
    /// * `max_memory_mb` - soft ceiling on tracked payload bytes
    pub fn new(ttl: Duration, max_entries: usize, max_memory_mb: f64) -> Self {
        info!(
            ttl_secs = ttl.as_secs_f64(),
            max_entries, max_memory_mb, "creating cache manager"
        );
        Self {
            store: Mutex::new(LruStore::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            ttl,
            max_entries: max_entries.max(1),
            max_memory_mb,
            hit_rate_target: DEFAULT_HIT_RATE_TARGET,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.ttl_secs),
            config.max_entries,
            config.max_memory_mb,
        )
    }

    /// Hit rate (percent) below which [`Self::is_cache_healthy`] reports an issue.
    pub fn with_hit_rate_target(mut self, percent: f64) -> Self {
        self.hit_rate_target = percent;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. Expired entries are evicted and count as misses.
    pub fn get_cached_data(&self, symbol: &str, category: &str) -> Option<CacheEntry> {
        let key = cache_key(symbol, category);
        let found = lock_or_recover(&self.store, "cache store").get(&key, Instant::now());

        match found {
            Some(entry) => {
                let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    key = %key,
                    age_secs = entry.age().as_secs_f64(),
                    ttl_secs = entry.ttl.as_secs_f64(),
                    size_bytes = entry.size_bytes,
                    hits,
                    misses = self.misses.load(Ordering::Relaxed),
                    "cache hit"
                );
                Some(entry)
            }
            None => {
                let misses = self.misses.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    key = %key,
                    hits = self.hits.load(Ordering::Relaxed),
                    misses,
                    "cache miss"
                );
                None
            }
        }
    }

    /// Store `payload` with the configured ttl.
    ///
    /// Returns `false` when the write was refused: either the memory ceiling
    /// is already exceeded or the payload could not be measured.
    pub fn set_cached_data(&self, symbol: &str, category: &str, payload: serde_json::Value) -> bool {
        self.set_cached_data_with_ttl(symbol, category, payload, self.ttl)
    }

    pub fn set_cached_data_with_ttl(
        &self,
        symbol: &str,
        category: &str,
        payload: serde_json::Value,
        ttl: Duration,
    ) -> bool {
        match self.try_set(symbol, category, payload, ttl) {
            Ok(stored) => stored,
            Err(e) => {
                error!(symbol, category, error = %e, "failed to cache payload");
                false
            }
        }
    }

    fn try_set(
        &self,
        symbol: &str,
        category: &str,
        payload: serde_json::Value,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let payload_bytes = serde_json::to_vec(&payload)
            .map_err(|source| CacheError::Serialization {
                key: cache_key(symbol, category),
                source,
            })?
            .len();
        let entry = CacheEntry::new(symbol, category, payload, ttl, payload_bytes);

        let mut store = lock_or_recover(&self.store, "cache store");
        let usage_mb = store.bytes() as f64 / BYTES_PER_MB;
        if usage_mb > self.max_memory_mb {
            warn!(
                key = %entry.key,
                usage_mb,
                limit_mb = self.max_memory_mb,
                "memory ceiling exceeded, refusing new cache entry"
            );
            return Ok(false);
        }

        let key = entry.key.clone();
        let size_bytes = entry.size_bytes;
        let evicted = store.insert(entry, self.max_entries, Instant::now());
        debug!(key = %key, size_bytes, evicted, "cached payload");
        Ok(true)
    }

    /// Remove one entry. Returns whether anything was removed.
    pub fn invalidate(&self, symbol: &str, category: &str) -> bool {
        let key = cache_key(symbol, category);
        let removed = lock_or_recover(&self.store, "cache store").remove(&key).is_some();
        if removed {
            debug!(key = %key, "invalidated cache entry");
        }
        removed
    }

    /// Drop every entry and reset hit/miss counters.
    pub fn clear_all(&self) {
        lock_or_recover(&self.store, "cache store").clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("cache cleared");
    }

    /// Evict every expired entry now. Reads do this lazily per key.
    pub fn purge_expired(&self) -> usize {
        let purged = lock_or_recover(&self.store, "cache store").purge_expired(Instant::now());
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }

    /// Distinct symbols with a live entry, in sorted order.
    pub fn cached_keys(&self) -> Vec<String> {
        let store = lock_or_recover(&self.store, "cache store");
        let symbols: BTreeSet<String> = store
            .live_entries(Instant::now())
            .map(|entry| entry.symbol.clone())
            .collect();
        symbols.into_iter().collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let total_requests = hit_count + miss_count;
        let hit_rate = if total_requests > 0 {
            hit_count as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        // Expired entries are swept first so counts only cover live data.
        let (cache_entries, bytes) = {
            let mut store = lock_or_recover(&self.store, "cache store");
            store.purge_expired(Instant::now());
            (store.len(), store.bytes())
        };

        CacheStats {
            hit_count,
            miss_count,
            total_requests,
            hit_rate_percent: round2(hit_rate),
            cache_entries,
            max_entries: self.max_entries,
            memory_usage_mb: round2(bytes as f64 / BYTES_PER_MB),
            memory_limit_mb: self.max_memory_mb,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Tracked payload size in MB, unrounded.
    pub fn memory_usage_mb(&self) -> f64 {
        lock_or_recover(&self.store, "cache store").bytes() as f64 / BYTES_PER_MB
    }

    /// Returns `(healthy, issues)`.
    pub fn is_cache_healthy(&self) -> (bool, Vec<String>) {
        let stats = self.cache_stats();
        let mut issues = Vec::new();

        if stats.total_requests >= MIN_LOOKUPS_FOR_HIT_RATE
            && stats.hit_rate_percent < self.hit_rate_target
        {
            issues.push(format!(
                "Low hit rate: {}% (target: {}%+)",
                stats.hit_rate_percent, self.hit_rate_target
            ));
        }

        let usage_mb = self.memory_usage_mb();
        if usage_mb > self.max_memory_mb {
            issues.push(format!(
                "Memory usage over limit: {:.3}MB (limit: {}MB)",
                usage_mb, self.max_memory_mb
            ));
        }

        let utilization = stats.cache_entries as f64 / stats.max_entries as f64 * 100.0;
        if utilization > FULL_UTILIZATION_PERCENT {
            issues.push(format!(
                "Cache nearly full: {:.1}% ({}/{})",
                utilization, stats.cache_entries, stats.max_entries
            ));
        }

        (issues.is_empty(), issues)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
