//! Process-lifetime content-addressed cache.
//!
//! Encoding derivatives is the expensive part of the pipeline: one source at
//! three formats and seven responsive widths is two dozen encoder runs, and
//! AVIF alone can take seconds. This module lets the pipeline skip that work
//! when the same (source, options) pair is requested again.
//!
//! # Design
//!
//! The cache is keyed by [`Fingerprint`], the full SHA-256 of the source
//! identifier and the canonical options. Values are stored behind [`Arc`] so a
//! hit hands out the exact same value every time without copying encoded
//! bytes around.
//!
//! ## Single flight
//!
//! A plain "check, compute, store" sequence lets two concurrent misses on one
//! key both run the compute step. [`ContentCache::get_or_compute`] instead
//! keeps an in-flight table mapping each key under computation to a shared
//! [`OnceLock`] slot. The first requester (the leader) fills the slot; every
//! concurrent requester blocks on the same slot and receives the leader's
//! result. The finished value is published into the entry map and the
//! in-flight slot removed in one step, so a later requester either sees the
//! entry or joins the slot, never neither.
//!
//! Lock order is always `in_flight` before `state`.
//!
//! ## Capacity
//!
//! With a capacity of 0 the cache never evicts, and entries live until
//! [`clear`](ContentCache::clear). A non-zero capacity bounds the number of
//! entries; inserting past the bound evicts the least recently used entry.

use crate::fingerprint::Fingerprint;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// How a [`ContentCache::get_or_compute`] call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Served from a stored entry.
    Hit,
    /// This call ran the compute step.
    Computed,
    /// Another caller was already computing this key; its result was shared.
    Joined,
}

struct Slot<V> {
    value: Arc<V>,
    last_used: u64,
}

struct CacheState<V> {
    entries: HashMap<Fingerprint, Slot<V>>,
    tick: u64,
}

impl<V> CacheState<V> {
    fn touch(&mut self, key: &Fingerprint) -> Option<Arc<V>> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|slot| {
            slot.last_used = tick;
            Arc::clone(&slot.value)
        })
    }

    fn insert(&mut self, key: Fingerprint, value: Arc<V>, capacity: usize) {
        self.tick += 1;
        let last_used = self.tick;
        self.entries.insert(key, Slot { value, last_used });

        if capacity > 0 {
            while self.entries.len() > capacity {
                let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, slot)| slot.last_used)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                tracing::debug!(key = %oldest.short(), "evicting least recently used entry");
                self.entries.remove(&oldest);
            }
        }
    }
}

type InFlight<V> = HashMap<Fingerprint, Arc<OnceLock<Arc<V>>>>;

/// Thread-safe map from [`Fingerprint`] to a computed value.
pub struct ContentCache<V> {
    state: Mutex<CacheState<V>>,
    in_flight: Mutex<InFlight<V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    computes: AtomicU64,
}

impl<V> Default for ContentCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ContentCache<V> {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A cache holding at most `capacity` entries (0 = unbounded).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tick: 0,
            }),
            in_flight: Mutex::new(HashMap::new()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computes: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, InFlight<V>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, found: bool) {
        let counter = if found { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Look up a stored value.
    pub fn get(&self, key: &Fingerprint) -> Option<Arc<V>> {
        let found = self.state().touch(key);
        self.record(found.is_some());
        found
    }

    /// Store a value, replacing any previous entry under `key`.
    pub fn set(&self, key: Fingerprint, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.state().insert(key, Arc::clone(&value), self.capacity);
        value
    }

    /// Return the stored value for `key`, or run `compute` to produce it.
    ///
    /// Concurrent callers missing on the same key share one `compute` run.
    /// The value is only visible to other callers once `compute` has
    /// returned; a panicking `compute` stores nothing.
    pub fn get_or_compute<F>(&self, key: &Fingerprint, compute: F) -> (Arc<V>, Lookup)
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.state().touch(key) {
            self.record(true);
            return (value, Lookup::Hit);
        }

        let slot = {
            let mut in_flight = self.in_flight();
            // A leader may have published between the check above and here
            if let Some(value) = self.state().touch(key) {
                self.record(true);
                return (value, Lookup::Hit);
            }
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };
        self.record(false);

        let mut computed = false;
        let value = Arc::clone(slot.get_or_init(|| {
            computed = true;
            Arc::new(compute())
        }));

        if !computed {
            return (value, Lookup::Joined);
        }

        self.computes.fetch_add(1, Ordering::Relaxed);
        let mut in_flight = self.in_flight();
        self.state()
            .insert(key.clone(), Arc::clone(&value), self.capacity);
        if in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            in_flight.remove(key);
        }
        (value, Lookup::Computed)
    }

    /// Drop every stored entry. Counters are kept.
    pub fn clear(&self) {
        self.state().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored values, in no particular order.
    pub fn values(&self) -> Vec<Arc<V>> {
        self.state()
            .entries
            .values()
            .map(|slot| Arc::clone(&slot.value))
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<Fingerprint> = self.state().entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computes: self.computes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of cache contents and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    /// Stored keys, sorted.
    pub keys: Vec<Fingerprint>,
    pub hits: u64,
    /// Lookups that found no stored entry, including ones that joined an
    /// in-flight computation.
    pub misses: u64,
    /// Compute steps actually run.
    pub computes: u64,
}

impl CacheStats {
    /// Misses answered by another caller's in-flight computation.
    pub fn shared(&self) -> u64 {
        self.misses.saturating_sub(self.computes)
    }

    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.shared() > 0 {
            if self.shared() > 0 {
                write!(
                    f,
                    "{} cached, {} shared, {} computed ({} total)",
                    self.hits,
                    self.shared(),
                    self.computes,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} computed ({} total)",
                    self.hits,
                    self.computes,
                    self.total()
                )
            }
        } else {
            write!(f, "{} computed", self.computes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::derive;
    use serde_json::json;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn key(name: &str) -> Fingerprint {
        derive(name, &json!({})).unwrap()
    }

    // =========================================================================
    // Basic map operations
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let cache: ContentCache<String> = ContentCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn set_then_get_returns_same_value() {
        let cache = ContentCache::new();
        let stored = cache.set(key("a"), "manifest".to_string());

        let got = cache.get(&key("a")).unwrap();
        assert!(Arc::ptr_eq(&stored, &got));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_replaces_existing_entry() {
        let cache = ContentCache::new();
        cache.set(key("a"), 1);
        cache.set(key("a"), 2);
        assert_eq!(*cache.get(&key("a")).unwrap(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_drops_entries() {
        let cache = ContentCache::new();
        cache.set(key("a"), 1);
        cache.set(key("b"), 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a")), None);
    }

    #[test]
    fn stats_lists_sorted_keys() {
        let cache = ContentCache::new();
        cache.set(key("b"), 1);
        cache.set(key("a"), 2);

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        let mut expected = vec![key("a"), key("b")];
        expected.sort();
        assert_eq!(stats.keys, expected);
    }

    #[test]
    fn values_snapshot_contains_all_entries() {
        let cache = ContentCache::new();
        cache.set(key("a"), 1);
        cache.set(key("b"), 2);
        let mut values: Vec<i32> = cache.values().iter().map(|v| **v).collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }

    // =========================================================================
    // Read-through
    // =========================================================================

    #[test]
    fn get_or_compute_computes_once_then_hits() {
        let cache = ContentCache::new();
        let calls = AtomicUsize::new(0);

        let (first, lookup) = cache.get_or_compute(&key("a"), || {
            calls.fetch_add(1, Ordering::SeqCst);
            "value".to_string()
        });
        assert_eq!(lookup, Lookup::Computed);

        let (second, lookup) = cache.get_or_compute(&key("a"), || {
            calls.fetch_add(1, Ordering::SeqCst);
            "other".to_string()
        });
        assert_eq!(lookup, Lookup::Hit);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.computes), (1, 1, 1));
    }

    #[test]
    fn get_or_compute_sees_value_from_set() {
        let cache = ContentCache::new();
        cache.set(key("a"), 7);
        let (value, lookup) = cache.get_or_compute(&key("a"), || 0);
        assert_eq!((*value, lookup), (7, Lookup::Hit));
    }

    #[test]
    fn distinct_keys_compute_independently() {
        let cache = ContentCache::new();
        let (a, _) = cache.get_or_compute(&key("a"), || 1);
        let (b, _) = cache.get_or_compute(&key("b"), || 2);
        assert_eq!((*a, *b), (1, 2));
        assert_eq!(cache.stats().computes, 2);
    }

    #[test]
    fn panicking_compute_stores_nothing() {
        let cache: ContentCache<i32> = ContentCache::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_or_compute(&key("a"), || panic!("compute failed"))
        }));
        assert!(result.is_err());
        assert!(cache.is_empty());

        let (value, lookup) = cache.get_or_compute(&key("a"), || 3);
        assert_eq!((*value, lookup), (3, Lookup::Computed));
    }

    // =========================================================================
    // Single flight
    // =========================================================================

    #[test]
    fn concurrent_misses_share_one_compute() {
        const THREADS: usize = 8;
        let cache: ContentCache<String> = ContentCache::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);
        let k = key("/photos/hero.jpg");

        let results: Vec<(Arc<String>, Lookup)> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.get_or_compute(&k, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Keep the leader busy so the others pile up on the slot
                            thread::sleep(Duration::from_millis(50));
                            "manifest".to_string()
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), THREADS);
        for (value, _) in &results {
            assert!(Arc::ptr_eq(value, &results[0].0));
        }
        assert_eq!(
            results
                .iter()
                .filter(|(_, lookup)| *lookup == Lookup::Computed)
                .count(),
            1
        );

        let stats = cache.stats();
        assert_eq!(stats.computes, 1);
        assert_eq!(stats.hits + stats.misses, THREADS as u64);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn in_flight_slot_is_released_after_compute() {
        let cache = ContentCache::new();
        cache.get_or_compute(&key("a"), || 1);
        assert!(cache.in_flight().is_empty());
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    #[test]
    fn unbounded_cache_never_evicts() {
        let cache = ContentCache::new();
        for i in 0..100 {
            cache.set(key(&i.to_string()), i);
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn bounded_cache_evicts_least_recently_used() {
        let cache = ContentCache::with_capacity(2);
        cache.set(key("a"), 1);
        cache.set(key("b"), 2);
        // Touch "a" so "b" becomes the oldest
        cache.get(&key("a"));
        cache.set(key("c"), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn evicted_entry_is_recomputed() {
        let cache = ContentCache::with_capacity(1);
        cache.get_or_compute(&key("a"), || 1);
        cache.get_or_compute(&key("b"), || 2);
        let (_, lookup) = cache.get_or_compute(&key("a"), || 1);
        assert_eq!(lookup, Lookup::Computed);
        assert_eq!(cache.stats().computes, 3);
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats {
            hits: 5,
            misses: 2,
            computes: 2,
            ..CacheStats::default()
        };
        assert_eq!(format!("{}", s), "5 cached, 2 computed (7 total)");
    }

    #[test]
    fn cache_stats_display_with_shared() {
        let s = CacheStats {
            hits: 3,
            misses: 3,
            computes: 1,
            ..CacheStats::default()
        };
        assert_eq!(format!("{}", s), "3 cached, 2 shared, 1 computed (6 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let s = CacheStats {
            misses: 3,
            computes: 3,
            ..CacheStats::default()
        };
        assert_eq!(format!("{}", s), "3 computed");
    }
}
