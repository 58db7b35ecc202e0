use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::entry::CacheEntry;

struct Slot {
    entry: CacheEntry,
    last_used: u64,
}

/// Map plus recency index.
///
/// `order` maps a monotonically increasing use counter to the key, so the
/// first element is always the least recently used entry. Byte usage is the
/// sum of `size_bytes` of everything currently held.
#[derive(Default)]
pub(crate) struct LruStore {
    entries: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    tick: u64,
    bytes: usize,
}

impl LruStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Fetch a live entry and mark it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    pub(crate) fn get(&mut self, key: &str, now: Instant) -> Option<CacheEntry> {
        let expired = self.entries.get(key)?.entry.is_expired_at(now);
        if expired {
            self.remove(key);
            return None;
        }

        let tick = self.next_tick();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.last_used);
        slot.last_used = tick;
        self.order.insert(tick, key.to_string());
        Some(slot.entry.clone())
    }

    /// Insert or replace an entry, evicting to stay within `max_entries`.
    ///
    /// Expired entries are dropped before any live entry is evicted. Returns
    /// the number of entries evicted.
    pub(crate) fn insert(&mut self, entry: CacheEntry, max_entries: usize, now: Instant) -> usize {
        let key = entry.key.clone();
        self.remove(&key);

        let mut evicted = 0;
        if self.entries.len() >= max_entries {
            evicted += self.purge_expired(now);
        }
        while self.entries.len() >= max_entries {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&oldest) {
                self.bytes = self.bytes.saturating_sub(slot.entry.size_bytes);
                tracing::debug!(key = %oldest, "evicted least recently used cache entry");
                evicted += 1;
            }
        }

        let tick = self.next_tick();
        self.bytes += entry.size_bytes;
        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            Slot {
                entry,
                last_used: tick,
            },
        );
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.last_used);
        self.bytes = self.bytes.saturating_sub(slot.entry.size_bytes);
        Some(slot.entry)
    }

    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.bytes = 0;
    }

    pub(crate) fn live_entries(&self, now: Instant) -> impl Iterator<Item = &CacheEntry> {
        self.entries
            .values()
            .map(|slot| &slot.entry)
            .filter(move |entry| !entry.is_expired_at(now))
    }

    #[cfg(test)]
    pub(crate) fn get_raw_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key).map(|slot| &mut slot.entry)
    }
}
