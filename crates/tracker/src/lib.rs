//! Rolling request statistics.
//!
//! The tracker keeps finalized request records and rate-limit rejections for
//! a retention horizon. Anything older is pruned lazily on the next write or
//! read and never contributes to an aggregate. All aggregates are recomputed
//! from the retained history, so nothing here is authoritative state.

pub mod record;
pub mod stats;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use market_cache_common::{lock_or_recover, MonitoringConfig};
use tracing::{debug, info};

use crate::record::PendingRequest;
pub use crate::record::{RateLimitHit, RequestRecord};
pub use crate::stats::{GlobalStats, KeyStats, RateLimitSummary};
use crate::stats::{mean, percent};

const SECS_PER_HOUR: u64 = 3600;

pub struct RequestTracker {
    pending: Mutex<HashMap<String, PendingRequest>>,
    history: Mutex<VecDeque<RequestRecord>>,
    rate_limit_hits: Mutex<VecDeque<RateLimitHit>>,
    retention: Duration,
}

impl RequestTracker {
    pub fn new(retention_hours: u64) -> Self {
        Self::with_retention(Duration::from_secs(retention_hours.saturating_mul(SECS_PER_HOUR)))
    }

    pub fn with_retention(retention: Duration) -> Self {
        info!(retention_secs = retention.as_secs(), "creating request tracker");
        Self {
            pending: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            rate_limit_hits: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self::new(config.stats_retention_hours)
    }

    /// Open a request and return its id.
    pub fn record_request_start(&self, key: &str, category: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();

        let mut pending = lock_or_recover(&self.pending, "pending requests");
        // Requests that never completed would otherwise accumulate forever.
        let retention = self.retention;
        pending.retain(|_, p| now.saturating_duration_since(p.started_at) < retention);
        pending.insert(
            id.clone(),
            PendingRequest {
                key: key.to_string(),
                category: category.to_string(),
                started_at: now,
                timestamp: Utc::now(),
            },
        );
        id
    }

    /// Finalize a request.
    ///
    /// An unknown `id` (never started, or already pruned) is still recorded,
    /// using the supplied key and category and the current time as its start.
    pub fn record_request_complete(
        &self,
        id: &str,
        key: &str,
        succeeded: bool,
        latency_ms: f64,
        served_from_cache: bool,
        category: &str,
    ) {
        let started = lock_or_recover(&self.pending, "pending requests").remove(id);
        let (key, category, started_at, timestamp) = match started {
            Some(p) => (p.key, p.category, p.started_at, p.timestamp),
            None => (key.to_string(), category.to_string(), Instant::now(), Utc::now()),
        };

        debug!(
            id,
            key = %key,
            category = %category,
            succeeded,
            latency_ms,
            served_from_cache,
            "request completed"
        );

        let mut history = lock_or_recover(&self.history, "request history");
        let now = Instant::now();
        prune_records(&mut history, now, self.retention);
        history.push_back(RequestRecord {
            id: id.to_string(),
            key,
            category,
            started_at,
            completed_at: now,
            timestamp,
            succeeded,
            latency_ms,
            served_from_cache,
        });
    }

    pub fn record_rate_limit_hit(&self, key: &str, reason: &str, wait_seconds: f64, category: &str) {
        debug!(key, category, reason, wait_seconds, "rate limit hit recorded");

        let now = Instant::now();
        let mut hits = lock_or_recover(&self.rate_limit_hits, "rate limit hits");
        hits.push_back(RateLimitHit {
            key: key.to_string(),
            category: category.to_string(),
            reason: reason.to_string(),
            wait_seconds,
            at: now,
            timestamp: Utc::now(),
        });
        prune_hits(&mut hits, now, self.retention);
    }

    pub fn global_stats(&self) -> GlobalStats {
        let now = Instant::now();

        let rate_limit_hits = {
            let mut hits = lock_or_recover(&self.rate_limit_hits, "rate limit hits");
            prune_hits(&mut hits, now, self.retention);
            hits.len() as u64
        };
        let in_flight = lock_or_recover(&self.pending, "pending requests").len();

        let mut history = lock_or_recover(&self.history, "request history");
        prune_records(&mut history, now, self.retention);

        let mut successful = 0u64;
        let mut cache_hits = 0u64;
        let mut upstream = 0u64;
        let mut latency_sum = 0.0;
        let mut keys = HashSet::new();
        for record in history.iter() {
            if record.succeeded {
                successful += 1;
            }
            if record.served_from_cache {
                cache_hits += 1;
            } else {
                upstream += 1;
                latency_sum += record.latency_ms;
            }
            keys.insert(record.key.as_str());
        }
        let total = history.len() as u64;

        GlobalStats {
            total_requests: total,
            successful_requests: successful,
            failed_requests: total - successful,
            success_rate_percent: percent(successful, total),
            cache_hits,
            cache_hit_rate_percent: percent(cache_hits, total),
            average_latency_ms: mean(latency_sum, upstream),
            rate_limit_hits,
            unique_keys: keys.len(),
            in_flight,
            retention_hours: self.retention.as_secs() / SECS_PER_HOUR,
        }
    }

    pub fn rate_limit_summary(&self) -> RateLimitSummary {
        let mut hits = lock_or_recover(&self.rate_limit_hits, "rate limit hits");
        prune_hits(&mut hits, Instant::now(), self.retention);

        let mut hits_by_reason = BTreeMap::new();
        let mut hits_by_key = BTreeMap::new();
        let mut wait_sum = 0.0;
        let mut max_wait: f64 = 0.0;
        for hit in hits.iter() {
            *hits_by_reason.entry(hit.reason.clone()).or_insert(0) += 1;
            *hits_by_key.entry(hit.key.clone()).or_insert(0) += 1;
            wait_sum += hit.wait_seconds;
            max_wait = max_wait.max(hit.wait_seconds);
        }

        RateLimitSummary {
            total_hits: hits.len() as u64,
            hits_by_reason,
            hits_by_key,
            average_wait_seconds: mean(wait_sum, hits.len() as u64),
            max_wait_seconds: max_wait,
        }
    }

    /// The `n` busiest keys by request count, ties broken by key.
    pub fn top_keys(&self, n: usize) -> Vec<KeyStats> {
        let mut ranked: Vec<KeyStats> = self.per_key_stats().into_values().collect();
        ranked.sort_by(|a, b| {
            b.total_requests
                .cmp(&a.total_requests)
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn key_stats(&self, key: &str) -> Option<KeyStats> {
        self.per_key_stats().remove(key)
    }

    fn per_key_stats(&self) -> HashMap<String, KeyStats> {
        let now = Instant::now();
        let mut per_key: HashMap<String, KeyStats> = HashMap::new();
        let mut latency: HashMap<String, (f64, u64)> = HashMap::new();

        {
            let mut history = lock_or_recover(&self.history, "request history");
            prune_records(&mut history, now, self.retention);
            for record in history.iter() {
                let stats = per_key
                    .entry(record.key.clone())
                    .or_insert_with(|| KeyStats::empty(&record.key));
                stats.total_requests += 1;
                if record.succeeded {
                    stats.successful_requests += 1;
                } else {
                    stats.failed_requests += 1;
                }
                if record.served_from_cache {
                    stats.cache_hits += 1;
                } else {
                    let slot = latency.entry(record.key.clone()).or_insert((0.0, 0));
                    slot.0 += record.latency_ms;
                    slot.1 += 1;
                }
                if stats.last_request_at.map_or(true, |t| t < record.timestamp) {
                    stats.last_request_at = Some(record.timestamp);
                }
            }
        }

        {
            let mut hits = lock_or_recover(&self.rate_limit_hits, "rate limit hits");
            prune_hits(&mut hits, now, self.retention);
            for hit in hits.iter() {
                per_key
                    .entry(hit.key.clone())
                    .or_insert_with(|| KeyStats::empty(&hit.key))
                    .rate_limit_hits += 1;
            }
        }

        for (key, (sum, count)) in latency {
            if let Some(stats) = per_key.get_mut(&key) {
                stats.average_latency_ms = mean(sum, count);
            }
        }
        per_key
    }

    /// Drop all history, pending requests and rate-limit hits.
    pub fn reset_stats(&self) {
        lock_or_recover(&self.pending, "pending requests").clear();
        lock_or_recover(&self.history, "request history").clear();
        lock_or_recover(&self.rate_limit_hits, "rate limit hits").clear();
        info!("request statistics reset");
    }
}

fn prune_records(history: &mut VecDeque<RequestRecord>, now: Instant, retention: Duration) {
    while let Some(oldest) = history.front() {
        if now.saturating_duration_since(oldest.completed_at) >= retention {
            history.pop_front();
        } else {
            break;
        }
    }
}

fn prune_hits(hits: &mut VecDeque<RateLimitHit>, now: Instant, retention: Duration) {
    while let Some(oldest) = hits.front() {
        if now.saturating_duration_since(oldest.at) >= retention {
            hits.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(tracker: &RequestTracker, key: &str, ok: bool, latency: f64, cached: bool) {
        let id = tracker.record_request_start(key, "quote");
        tracker.record_request_complete(&id, key, ok, latency, cached, "quote");
    }

    #[test]
    fn empty_tracker_reports_zeroes() {
        let tracker = RequestTracker::new(24);
        let stats = tracker.global_stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.success_rate_percent, 0.0);
        assert_eq!(stats.cache_hit_rate_percent, 0.0);
        assert_eq!(stats.retention_hours, 24);
        assert!(tracker.top_keys(5).is_empty());
    }

    #[test]
    fn global_stats_aggregate_outcomes() {
        let tracker = RequestTracker::new(24);
        complete(&tracker, "2330", true, 100.0, false);
        complete(&tracker, "2330", true, 0.0, true);
        complete(&tracker, "2317", false, 300.0, false);
        complete(&tracker, "2317", true, 0.0, true);

        let stats = tracker.global_stats();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.successful_requests, 3);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.success_rate_percent, 75.0);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_hit_rate_percent, 50.0);
        assert_eq!(stats.average_latency_ms, 200.0);
        assert_eq!(stats.unique_keys, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn pending_requests_are_in_flight() {
        let tracker = RequestTracker::new(24);
        let id = tracker.record_request_start("2330", "quote");
        assert_eq!(tracker.global_stats().in_flight, 1);

        tracker.record_request_complete(&id, "ignored", true, 10.0, false, "ignored");
        let stats = tracker.global_stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(tracker.top_keys(1)[0].key, "2330");
    }

    #[test]
    fn unknown_id_still_records() {
        let tracker = RequestTracker::new(24);
        tracker.record_request_complete("no-such-id", "2330", false, 5.0, false, "quote");
        assert_eq!(tracker.global_stats().failed_requests, 1);
    }

    #[test]
    fn old_records_are_excluded() {
        let tracker = RequestTracker::with_retention(Duration::from_millis(100));
        complete(&tracker, "old", true, 10.0, false);
        tracker.record_rate_limit_hit("old", "global_limit_exceeded", 3.0, "quote");

        std::thread::sleep(Duration::from_millis(150));
        complete(&tracker, "new", true, 10.0, false);

        let stats = tracker.global_stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.rate_limit_hits, 0);
        assert!(tracker.key_stats("old").is_none());
        assert!(tracker.key_stats("new").is_some());
        assert_eq!(tracker.rate_limit_summary().total_hits, 0);
    }

    #[test]
    fn retention_follows_completion_time() {
        let tracker = RequestTracker::with_retention(Duration::from_millis(100));
        let slow = tracker.record_request_start("slow", "quote");
        for _ in 0..1000 {
            complete(&tracker, "fast", true, 1.0, false);
        }

        std::thread::sleep(Duration::from_millis(150));
        tracker.record_request_complete(&slow, "slow", true, 150.0, false, "quote");

        let stats = tracker.global_stats();
        assert_eq!(stats.total_requests, 1);
        assert!(tracker.key_stats("fast").is_none());
        assert_eq!(tracker.key_stats("slow").unwrap().total_requests, 1);
    }

    #[test]
    fn rate_limit_summary_groups_hits() {
        let tracker = RequestTracker::new(24);
        tracker.record_rate_limit_hit("2330", "stock_limit_exceeded_for_2330", 20.0, "quote");
        tracker.record_rate_limit_hit("2330", "global_limit_exceeded", 40.0, "quote");
        tracker.record_rate_limit_hit("2317", "global_limit_exceeded", 30.0, "quote");

        let summary = tracker.rate_limit_summary();
        assert_eq!(summary.total_hits, 3);
        assert_eq!(summary.hits_by_reason["global_limit_exceeded"], 2);
        assert_eq!(summary.hits_by_key["2330"], 2);
        assert_eq!(summary.average_wait_seconds, 30.0);
        assert_eq!(summary.max_wait_seconds, 40.0);
    }

    #[test]
    fn top_keys_ranks_by_volume() {
        let tracker = RequestTracker::new(24);
        for _ in 0..3 {
            complete(&tracker, "b", true, 10.0, false);
        }
        complete(&tracker, "a", true, 10.0, false);
        complete(&tracker, "c", true, 10.0, false);
        tracker.record_rate_limit_hit("c", "per_second_limit_exceeded", 0.5, "quote");

        let top = tracker.top_keys(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].key, "b");
        assert_eq!(top[0].total_requests, 3);
        assert_eq!(top[1].key, "a");

        let c = tracker.key_stats("c").unwrap();
        assert_eq!(c.rate_limit_hits, 1);
        assert_eq!(c.average_latency_ms, 10.0);
        assert!(c.last_request_at.is_some());
    }

    #[test]
    fn reset_clears_everything() {
        let tracker = RequestTracker::new(24);
        complete(&tracker, "2330", true, 10.0, false);
        tracker.record_request_start("2317", "quote");
        tracker.record_rate_limit_hit("2330", "global_limit_exceeded", 1.0, "quote");

        tracker.reset_stats();
        let stats = tracker.global_stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.rate_limit_hits, 0);
    }
}
