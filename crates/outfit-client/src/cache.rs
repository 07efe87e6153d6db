//! Keyed response cache with per-entry staleness windows.
//!
//! Values are stored as JSON so one cache can hold every response type.
//! Invalidation marks entries stale without dropping them; removal drops
//! them. Both match by key prefix. Every [`QueryCache::clear`] starts a new
//! epoch; a read that began in an earlier epoch cannot write back into it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use outfit_core::keys::QueryKey;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub fetched_at: Instant,
    pub stale_time: Duration,
    pub invalidated: bool,
}

impl CacheEntry {
    fn fresh(value: Value, stale_time: Duration, now: Instant) -> Self {
        CacheEntry {
            value,
            fetched_at: now,
            stale_time,
            invalidated: false,
        }
    }

    pub fn is_fresh_at(&self, now: Instant) -> bool {
        !self.invalidated && now.saturating_duration_since(self.fetched_at) < self.stale_time
    }
}

/// Cheap to clone; clones share entries.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, CacheEntry>>>,
    epoch: Arc<AtomicU64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value for `key` if it is still inside its window.
    pub fn get_fresh(&self, key: &QueryKey) -> Option<Value> {
        self.get_fresh_at(key, Instant::now())
    }

    pub fn get_fresh_at(&self, key: &QueryKey, now: Instant) -> Option<Value> {
        self.entries()
            .get(key)
            .filter(|e| e.is_fresh_at(now))
            .map(|e| e.value.clone())
    }

    /// The cached value regardless of staleness.
    pub fn peek(&self, key: &QueryKey) -> Option<Value> {
        self.entries().get(key).map(|e| e.value.clone())
    }

    pub fn peek_as<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.peek(key).and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn insert(&self, key: QueryKey, value: Value, stale_time: Duration) {
        self.insert_at(key, value, stale_time, Instant::now());
    }

    pub fn insert_at(&self, key: QueryKey, value: Value, stale_time: Duration, now: Instant) {
        self.entries().insert(key, CacheEntry::fresh(value, stale_time, now));
    }

    /// Current epoch; bumped by every [`clear`](Self::clear).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Insert only if no `clear` happened since `epoch` was read. Returns
    /// whether the value was stored.
    pub fn insert_in_epoch(
        &self,
        epoch: u64,
        key: QueryKey,
        value: Value,
        stale_time: Duration,
    ) -> bool {
        let mut entries = self.entries();
        if self.epoch() != epoch {
            debug!(key = %key, "cache cleared during fetch; dropping result");
            return false;
        }
        entries.insert(key, CacheEntry::fresh(value, stale_time, Instant::now()));
        true
    }

    /// Swap the value of an existing entry, keeping its timestamps.
    /// Returns `false` when nothing is cached under `key`.
    pub fn replace_value(&self, key: &QueryKey, value: Value) -> bool {
        match self.entries().get_mut(key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Mark every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut n = 0;
        for (key, entry) in self.entries().iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                n += 1;
            }
        }
        debug!(prefix = %prefix, count = n, "cache invalidated");
        n
    }

    /// Drop every entry under `prefix`. Returns how many were removed.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let n = before - entries.len();
        debug!(prefix = %prefix, count = n, "cache entries removed");
        n
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        entries.clear();
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries().contains_key(key)
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .map_or(true, |e| !e.is_fresh_at(Instant::now()))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outfit_core::keys::{analyses, products};
    use serde_json::json;

    const FIVE_MIN: Duration = Duration::from_secs(300);

    #[test]
    fn entry_is_fresh_inside_window_only() {
        let cache = QueryCache::new();
        let key = analyses::detail("a1");
        let t0 = Instant::now();
        cache.insert_at(key.clone(), json!({"id": "a1"}), FIVE_MIN, t0);

        assert!(cache.get_fresh_at(&key, t0 + Duration::from_secs(60)).is_some());
        assert!(cache.get_fresh_at(&key, t0 + FIVE_MIN).is_none());
        assert!(cache.peek(&key).is_some());
    }

    #[test]
    fn zero_window_is_always_stale() {
        let cache = QueryCache::new();
        let key = analyses::detail("a1");
        let t0 = Instant::now();
        cache.insert_at(key.clone(), json!(1), Duration::ZERO, t0);
        assert!(cache.get_fresh_at(&key, t0).is_none());
    }

    #[test]
    fn invalidate_marks_prefix_matches_stale() {
        let cache = QueryCache::new();
        cache.insert(analyses::list(&Default::default()), json!([]), FIVE_MIN);
        cache.insert(analyses::detail("a1"), json!({}), FIVE_MIN);
        cache.insert(products::detail("p1"), json!({}), FIVE_MIN);

        assert_eq!(cache.invalidate(&analyses::lists()), 1);
        assert!(cache.is_stale(&analyses::list(&Default::default())));
        assert!(!cache.is_stale(&analyses::detail("a1")));
        assert!(!cache.is_stale(&products::detail("p1")));
        // stale entries are kept
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn remove_drops_prefix_matches() {
        let cache = QueryCache::new();
        cache.insert(analyses::detail("a1"), json!({}), FIVE_MIN);
        cache.insert(analyses::detail("a2"), json!({}), FIVE_MIN);
        cache.insert(products::detail("p1"), json!({}), FIVE_MIN);

        assert_eq!(cache.remove(&analyses::all()), 2);
        assert!(!cache.contains(&analyses::detail("a1")));
        assert!(cache.contains(&products::detail("p1")));
    }

    #[test]
    fn replace_value_keeps_window() {
        let cache = QueryCache::new();
        let key = analyses::detail("a1");
        let t0 = Instant::now();
        cache.insert_at(key.clone(), json!({"v": 1}), FIVE_MIN, t0);
        assert!(cache.replace_value(&key, json!({"v": 2})));
        assert_eq!(cache.get_fresh_at(&key, t0).unwrap()["v"], 2);
        assert!(!cache.replace_value(&analyses::detail("nope"), json!(0)));
    }

    #[test]
    fn clear_rejects_writes_from_earlier_epoch() {
        let cache = QueryCache::new();
        let before = cache.epoch();
        cache.insert(analyses::detail("a1"), json!(1), FIVE_MIN);
        cache.clear();

        assert!(!cache.insert_in_epoch(before, analyses::detail("a1"), json!(1), FIVE_MIN));
        assert!(cache.is_empty());
        assert!(cache.insert_in_epoch(cache.epoch(), analyses::detail("a2"), json!(2), FIVE_MIN));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reinsert_clears_invalidation() {
        let cache = QueryCache::new();
        let key = analyses::detail("a1");
        cache.insert(key.clone(), json!(1), FIVE_MIN);
        cache.invalidate(&key);
        assert!(cache.get_fresh(&key).is_none());
        cache.insert(key.clone(), json!(2), FIVE_MIN);
        assert_eq!(cache.get_fresh(&key), Some(json!(2)));
    }
}
