// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Generic time-bounded cache
//!
//! [`TtlCache`] backs every cache in the resolver: endpoint health, method capability and gas
//! prices. Expiry is lazy: an entry older than the TTL is treated as absent and removed on the
//! read that finds it. [`TtlCache::cleanup_expired`] sweeps proactively, and the cache also
//! cleans up on its own when it approaches capacity.
//!
//! Ages are measured with [`tokio::time::Instant`] so paused-clock tests are deterministic.
//! Each entry also carries a wall-clock timestamp for reporting.

use std::{fmt::Debug, hash::Hash, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::metrics;

/// Default per-cache capacity bound
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A cached value with its age and access tracking
#[derive(Debug, Clone)]
pub struct CachedEntry<V> {
    /// The cached value
    pub value: V,
    /// When this entry was stored, on the monotonic clock used for expiry
    pub cached_at: Instant,
    /// When this entry was stored, on the wall clock
    pub recorded_at: DateTime<Utc>,
    /// How many times this entry has been read
    pub access_count: u64,
}

impl<V> CachedEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            recorded_at: Utc::now(),
            access_count: 0,
        }
    }

    /// An entry is fresh until strictly more than `ttl` has elapsed since it was stored
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() <= ttl
    }

    /// Time elapsed since this entry was stored
    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }
}

/// Concurrent key-value cache with a single TTL
///
/// Every operation is atomic per key; there is no cross-key locking and no guard is ever
/// returned to the caller.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    name: &'static str,
    entries: DashMap<K, CachedEntry<V>>,
    ttl: Duration,
    max_entries: usize,
    evict_fresh: bool,
    stats: DashMap<&'static str, u64>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create a cache with the default capacity bound
    ///
    /// `name` labels log lines and metrics.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_settings(name, ttl, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a custom capacity bound
    pub fn with_settings(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            evict_fresh: true,
            stats: DashMap::new(),
        }
    }

    /// Never evict fresh entries to make room
    ///
    /// At capacity only expired entries are dropped, and the cache grows past `max_entries`
    /// when every entry is still fresh. Entries must stay until their TTL runs out.
    #[must_use]
    pub fn without_fresh_eviction(mut self) -> Self {
        self.evict_fresh = false;
        self
    }

    /// Get a fresh value
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Get a fresh entry including its timestamps
    ///
    /// A stale entry found here is removed, unless another task replaced it with a fresh one
    /// in the meantime.
    pub fn get_entry(&self, key: &K) -> Option<CachedEntry<V>> {
        if let Some(mut cached) = self.entries.get_mut(key) {
            if cached.is_fresh(self.ttl) {
                cached.access_count += 1;
                self.increment_stat("hits");
                metrics::inc_cache_operation(self.name, "hit");
                trace!(cache = self.name, ?key, "cache hit");
                return Some(cached.clone());
            }
            drop(cached);

            let ttl = self.ttl;
            if self
                .entries
                .remove_if(key, |_, entry| !entry.is_fresh(ttl))
                .is_some()
            {
                self.increment_stat("expired");
                metrics::inc_cache_operation(self.name, "expired");
                debug!(cache = self.name, ?key, "expired cache entry removed");
            }
        }

        self.increment_stat("misses");
        metrics::inc_cache_operation(self.name, "miss");
        None
    }

    /// Whether a fresh entry exists, without counting as an access
    pub fn contains_fresh(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh(self.ttl))
    }

    /// Fresh value without counting as an access or removing stale entries
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite a value, restarting its TTL
    pub fn insert(&self, key: K, value: V) {
        if !self.entries.contains_key(&key) {
            let current_size = self.entries.len();
            let capacity_threshold = self.max_entries - self.max_entries / 10;

            if current_size >= capacity_threshold {
                self.cleanup_expired();
            }
            if self.evict_fresh && self.entries.len() >= self.max_entries {
                self.evict_oldest_entry();
            }
        }

        trace!(cache = self.name, ?key, "stored cache entry");
        self.entries.insert(key, CachedEntry::new(value));
        self.increment_stat("stores");
        metrics::inc_cache_operation(self.name, "store");
        metrics::set_cache_entries(self.name, self.entries.len());
    }

    /// Remove an entry regardless of age
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key).map(|(_, entry)| entry.value);
        if removed.is_some() {
            metrics::set_cache_entries(self.name, self.entries.len());
        }
        removed
    }

    /// Snapshot of all fresh entries
    pub fn snapshot(&self) -> Vec<(K, CachedEntry<V>)> {
        self.entries
            .iter()
            .filter(|item| item.value().is_fresh(self.ttl))
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut removed = 0_usize;
        self.entries.retain(|_, entry| {
            let keep = entry.is_fresh(ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.add_stat("expired", removed as u64);
            metrics::set_cache_entries(self.name, self.entries.len());
            debug!(
                cache = self.name,
                removed_entries = removed,
                remaining_entries = self.entries.len(),
                "cleaned up expired cache entries"
            );
        }
        removed
    }

    /// Evict the entry stored longest ago
    fn evict_oldest_entry(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|item| (item.value().cached_at, item.value().access_count))
            .map(|item| item.key().clone());

        if let Some(key) = oldest
            && let Some((_, entry)) = self.entries.remove(&key)
        {
            self.increment_stat("evictions");
            metrics::inc_cache_operation(self.name, "eviction");
            info!(
                cache = self.name,
                ?key,
                access_count = entry.access_count,
                age_ms = entry.age().as_millis(),
                remaining_entries = self.entries.len(),
                "evicted oldest cache entry due to capacity limit"
            );
        }
    }

    /// Remove every entry and reset statistics
    pub fn clear(&self) {
        self.entries.clear();
        self.stats.clear();
        metrics::set_cache_entries(self.name, 0);
        debug!(cache = self.name, "cleared cache");
    }

    /// Number of stored entries, including stale ones not yet removed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache name used in logs and metrics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.get_stat("hits");
        let misses = self.get_stat("misses");
        let total_reads = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total_reads > 0 {
            hits as f64 / total_reads as f64
        } else {
            0.0
        };

        CacheStats {
            name: self.name.to_string(),
            entry_count: self.entries.len(),
            hits,
            misses,
            stores: self.get_stat("stores"),
            evictions: self.get_stat("evictions"),
            expired: self.get_stat("expired"),
            hit_rate,
            max_capacity: self.max_entries,
            ttl_ms: u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn increment_stat(&self, key: &'static str) {
        self.add_stat(key, 1);
    }

    fn add_stat(&self, key: &'static str, amount: u64) {
        *self.stats.entry(key).or_insert(0) += amount;
    }

    fn get_stat(&self, key: &'static str) -> u64 {
        self.stats.get(key).map_or(0, |v| *v)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cache name
    pub name: String,
    /// Number of stored entries
    pub entry_count: usize,
    /// Reads that found a fresh entry
    pub hits: u64,
    /// Reads that found nothing fresh
    pub misses: u64,
    /// Inserts and overwrites
    pub stores: u64,
    /// Entries dropped at capacity
    pub evictions: u64,
    /// Entries dropped for age
    pub expired: u64,
    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
    /// Capacity bound
    pub max_capacity: usize,
    /// TTL in milliseconds
    pub ttl_ms: u64,
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn store_and_get() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        assert_eq!(cache.get(&"a"), None);

        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        cache.insert("a", 2);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_expiration() {
        let cache = TtlCache::new("test", Duration::from_millis(10));
        cache.insert("a", "value");
        assert!(cache.contains_fresh(&"a"));

        thread::sleep(Duration::from_millis(15));

        assert!(!cache.contains_fresh(&"a"));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty(), "Expired entry should be removed on read");
        assert_eq!(cache.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_boundary_is_inclusive() {
        let ttl = Duration::from_secs(300);
        let cache = TtlCache::new("test", ttl);
        cache.insert(1_u8, ());

        tokio::time::advance(ttl).await;
        assert!(cache.contains_fresh(&1), "Entry is still fresh at exactly the TTL");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!cache.contains_fresh(&1));
    }

    #[test]
    fn cache_statistics() {
        let cache = TtlCache::new("stats", Duration::from_secs(60));
        let initial = cache.stats();
        assert_eq!(initial.hits, 0);
        assert_eq!(initial.misses, 0);
        assert_eq!(initial.max_capacity, DEFAULT_MAX_ENTRIES);
        assert_eq!(initial.ttl_ms, 60_000);

        cache.get(&"k");
        cache.insert("k", 1);
        cache.get(&"k");

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.stores, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn cache_cleanup() {
        let cache = TtlCache::new("cleanup", Duration::from_millis(10));
        cache.insert("old", 1);
        thread::sleep(Duration::from_millis(15));
        cache.insert("new", 2);

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new"), Some(2));
    }

    #[test]
    fn oldest_entry_eviction() {
        let cache = TtlCache::with_settings("evict", Duration::from_secs(3600), 2);
        cache.insert("first", 1);
        thread::sleep(Duration::from_millis(2));
        cache.insert("second", 2);
        thread::sleep(Duration::from_millis(2));
        cache.insert("third", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"first"), None);
        assert_eq!(cache.get(&"second"), Some(2));
        assert_eq!(cache.get(&"third"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn overwrite_at_capacity_does_not_evict() {
        let cache = TtlCache::with_settings("evict", Duration::from_secs(3600), 2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(3));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn fresh_entries_survive_capacity_without_fresh_eviction() {
        let cache =
            TtlCache::with_settings("pinned", Duration::from_millis(50), 2).without_fresh_eviction();
        cache.insert("first", 1);
        cache.insert("second", 2);
        cache.insert("third", 3);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"first"), Some(1));
        assert_eq!(cache.stats().evictions, 0);

        thread::sleep(Duration::from_millis(60));
        cache.insert("fourth", 4);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"fourth"), Some(4));
        assert_eq!(cache.stats().expired, 3);
    }

    #[test]
    fn snapshot_skips_stale_entries() {
        let cache = TtlCache::new("snap", Duration::from_millis(10));
        cache.insert("stale", 1);
        thread::sleep(Duration::from_millis(15));
        cache.insert("fresh", 2);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "fresh");
        assert_eq!(snapshot[0].1.value, 2);
    }

    #[test]
    fn clear_resets_entries_and_stats() {
        let cache = TtlCache::new("clear", Duration::from_secs(60));
        cache.insert(1, 1);
        cache.get(&1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }
}
