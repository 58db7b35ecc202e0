use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use market_cache_common::lock_or_recover;

/// A global sliding window log.
///
/// Unlike a fixed-window counter this keeps every accepted request timestamp
/// inside the window, so the count is exact and the wait until a slot frees
/// up can be computed from the oldest retained entry. Timestamps are pushed
/// under the lock, which keeps the log monotonically non-decreasing.
pub struct SlidingWindowLog {
    timestamps: Mutex<VecDeque<Instant>>,
    window: Duration,
    limit: usize,
    name: &'static str,
}

impl SlidingWindowLog {
    /// Create a new window log.
    ///
    /// * `limit`  - maximum accepted requests inside one window
    /// * `window` - window length
    /// * `name`   - label used in logs
    pub fn new(limit: usize, window: Duration, name: &'static str) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::with_capacity(limit)),
            window,
            limit,
            name,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check whether another request fits in the window.
    ///
    /// Returns `(true, 0)` when it fits, otherwise `(false, wait)` where `wait`
    /// is the time until the oldest retained entry leaves the window.
    pub fn check(&self) -> (bool, Duration) {
        self.check_at(Instant::now())
    }

    pub(crate) fn check_at(&self, now: Instant) -> (bool, Duration) {
        let mut timestamps = lock_or_recover(&self.timestamps, self.name);
        prune(&mut timestamps, now, self.window);

        if timestamps.len() < self.limit {
            return (true, Duration::ZERO);
        }

        let wait = timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or(Duration::ZERO);
        (false, wait)
    }

    /// Append an accepted request.
    pub fn record(&self) {
        let mut timestamps = lock_or_recover(&self.timestamps, self.name);
        let now = Instant::now();
        timestamps.push_back(now);
        prune(&mut timestamps, now, self.window);
    }

    #[cfg(test)]
    pub(crate) fn record_at(&self, at: Instant) {
        let mut timestamps = lock_or_recover(&self.timestamps, self.name);
        timestamps.push_back(at);
    }

    /// Number of requests currently inside the window.
    pub fn count(&self) -> usize {
        let mut timestamps = lock_or_recover(&self.timestamps, self.name);
        prune(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }

    pub fn reset(&self) {
        lock_or_recover(&self.timestamps, self.name).clear();
    }
}

/// Drop entries that are at least one window old.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
