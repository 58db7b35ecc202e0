use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Enforces a minimum spacing between accepted requests for the same key.
///
/// Each key maps to the instant of its last accepted request. Keys that have
/// never been recorded are always allowed.
pub struct PerKeyLimiter {
    last_request: DashMap<String, Instant>,
    interval: Duration,
}

impl PerKeyLimiter {
    /// * `interval` - minimum time between two accepted requests for one key
    pub fn new(interval: Duration) -> Self {
        Self {
            last_request: DashMap::new(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `(true, 0)` if the key may be fetched now, otherwise
    /// `(false, wait)` with the remaining part of the interval.
    pub fn check(&self, key: &str) -> (bool, Duration) {
        self.check_at(key, Instant::now())
    }

    pub(crate) fn check_at(&self, key: &str, now: Instant) -> (bool, Duration) {
        let Some(last) = self.last_request.get(key).map(|entry| *entry.value()) else {
            return (true, Duration::ZERO);
        };

        let elapsed = now.saturating_duration_since(last);
        if elapsed >= self.interval {
            (true, Duration::ZERO)
        } else {
            (false, self.interval - elapsed)
        }
    }

    /// Mark `key` as fetched now.
    pub fn record(&self, key: &str) {
        self.last_request.insert(key.to_string(), Instant::now());
    }

    #[cfg(test)]
    pub(crate) fn record_at(&self, key: &str, at: Instant) {
        self.last_request.insert(key.to_string(), at);
    }

    pub fn tracked_keys(&self) -> usize {
        self.last_request.len()
    }

    pub fn reset(&self) {
        self.last_request.clear();
    }

    /// Remove keys whose interval has already elapsed.
    ///
    /// Those entries can no longer reject anything, so dropping them keeps
    /// the map bounded by the keys fetched within one interval.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let interval = self.interval;

        self.last_request
            .retain(|_key, last| now.saturating_duration_since(*last) < interval);

        tracing::debug!(
            remaining = self.last_request.len(),
            "per-key limiter cleanup complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_key_is_allowed() {
        let limiter = PerKeyLimiter::new(Duration::from_secs(30));
        assert_eq!(limiter.check("2330"), (true, Duration::ZERO));
    }

    #[test]
    fn recorded_key_waits_for_interval() {
        let limiter = PerKeyLimiter::new(Duration::from_secs(30));
        let now = Instant::now();
        limiter.record_at("2330", now - Duration::from_secs(12));

        assert_eq!(
            limiter.check_at("2330", now),
            (false, Duration::from_secs(18))
        );
        assert_eq!(
            limiter.check_at("2330", now + Duration::from_secs(18)),
            (true, Duration::ZERO)
        );
    }

    #[test]
    fn independent_keys() {
        let limiter = PerKeyLimiter::new(Duration::from_secs(30));
        limiter.record("2330");

        assert!(!limiter.check("2330").0);
        assert!(limiter.check("2317").0);
    }

    #[test]
    fn cleanup_removes_elapsed_entries() {
        let limiter = PerKeyLimiter::new(Duration::from_secs(30));
        limiter.record("keep-alive");
        limiter.record_at("will-be-stale", Instant::now() - Duration::from_secs(31));

        limiter.cleanup();

        assert!(limiter.last_request.contains_key("keep-alive"));
        assert!(!limiter.last_request.contains_key("will-be-stale"));
    }
}
