//! Cache Store Module
//!
//! Authoritative in-memory entry map with TTL expiry and the count and size
//! bounds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::cache::{duration_to_ms, CacheCounters, CacheEntry, CacheKey, CacheStats, Clock};

/// Default maximum number of live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default maximum total serialized size (100 MiB).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;

// == Store Limits ==
/// Resource bounds enforced after every insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum sum of `size_bytes` over live entries
    pub max_size_bytes: u64,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
        }
    }
}

// == Cache Store ==
/// Entry map plus lifetime counters.
///
/// Not synchronized on its own; the facade wraps it in a single mutex.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry>,
    /// Lifetime hit/miss/eviction counters
    counters: CacheCounters,
    /// Count and size bounds
    limits: StoreLimits,
    /// Time source for expiry checks
    clock: Arc<dyn Clock>,
    /// Set whenever the entry map changed since the last `take_dirty`
    dirty: bool,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new(limits: StoreLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            counters: CacheCounters::new(),
            limits,
            clock,
            dirty: false,
        }
    }

    // == Hydrate ==
    /// Rebuilds a store from persisted entries and counters.
    ///
    /// Expired entries are dropped and the limits are applied, since the
    /// configuration may have shrunk since the state was written.
    pub fn hydrate(
        entries: impl IntoIterator<Item = CacheEntry>,
        counters: CacheCounters,
        limits: StoreLimits,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut store = Self::new(limits, clock);
        store.counters = counters;
        for entry in entries {
            store.entries.insert(entry.key.clone(), entry);
        }

        let expired = store.sweep_expired();
        let evicted = store.evict_by_count(None) + store.evict_by_size(None);
        store.counters.record_evictions(evicted);
        store.dirty = expired + evicted > 0;
        store
    }

    // == Lookup ==
    /// Returns the live entry for `key`.
    ///
    /// An expired entry is removed and reported as absent. Hits bump the
    /// entry's `hit_count`; both outcomes update the lifetime counters.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now_ms();
        let operation = key.operation();

        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.counters.record_miss(operation);
                debug!(key = %key, "cache miss");
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.counters.record_miss(operation);
            self.dirty = true;
            debug!(key = %key, "cache entry expired");
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.record_hit();
        let entry = entry.clone();
        self.counters.record_hit(operation);
        self.dirty = true;
        debug!(key = %key, hits = entry.hit_count, "cache hit");
        Some(entry)
    }

    // == Insert ==
    /// Stores `value` under `key`, replacing any existing entry, then enforces
    /// the limits.
    ///
    /// The new entry is never chosen for eviction, even when it alone exceeds
    /// the size bound. Returns the number of other entries evicted.
    pub fn insert(
        &mut self,
        key: CacheKey,
        operation: impl Into<String>,
        value: Value,
        ttl: Duration,
    ) -> usize {
        let entry = CacheEntry::new(key.clone(), operation, value, ttl, self.clock.now_ms());
        debug!(
            key = %key,
            size_bytes = entry.size_bytes,
            ttl_ms = duration_to_ms(ttl),
            "cache insert"
        );

        self.entries.insert(key.clone(), entry);
        self.dirty = true;
        self.enforce_limits(&key)
    }

    // == Remove By Operation ==
    /// Removes every entry produced by `operation`.
    pub fn remove_by_operation(&mut self, operation: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.operation != operation);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    // == Remove All ==
    /// Removes every entry. Counters are kept.
    pub fn remove_all(&mut self) -> usize {
        let removed = self.entries.len();
        if removed > 0 {
            self.entries.clear();
            self.dirty = true;
        }
        removed
    }

    // == Sweep Expired ==
    /// Removes all entries whose `expires_at` has passed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
            debug!(removed, "swept expired entries");
        }
        removed
    }

    // == Enforce Limits ==
    /// Applies the count bound, then the size bound on what remains.
    fn enforce_limits(&mut self, protected: &CacheKey) -> usize {
        self.sweep_expired();
        let evicted = self.evict_by_count(Some(protected)) + self.evict_by_size(Some(protected));
        if evicted > 0 {
            self.counters.record_evictions(evicted);
            self.dirty = true;
        }
        evicted
    }

    /// Evicts oldest-created entries until the count bound holds.
    fn evict_by_count(&mut self, protected: Option<&CacheKey>) -> usize {
        if self.entries.len() <= self.limits.max_entries {
            return 0;
        }

        let mut candidates: Vec<(u64, CacheKey)> = self
            .entries
            .values()
            .filter(|entry| Some(&entry.key) != protected)
            .map(|entry| (entry.created_at, entry.key.clone()))
            .collect();
        candidates.sort();

        let excess = self.entries.len() - self.limits.max_entries;
        let mut evicted = 0;
        for (_, key) in candidates.into_iter().take(excess) {
            self.entries.remove(&key);
            debug!(key = %key, "evicted by count bound");
            evicted += 1;
        }
        evicted
    }

    /// Evicts least-hit entries until the size bound holds.
    ///
    /// Ties on `hit_count` fall back to key order.
    fn evict_by_size(&mut self, protected: Option<&CacheKey>) -> usize {
        let mut total = self.total_size_bytes();
        if total <= self.limits.max_size_bytes {
            return 0;
        }

        let mut candidates: Vec<(u64, CacheKey)> = self
            .entries
            .values()
            .filter(|entry| Some(&entry.key) != protected)
            .map(|entry| (entry.hit_count, entry.key.clone()))
            .collect();
        candidates.sort();

        let mut evicted = 0;
        for (_, key) in candidates {
            if total <= self.limits.max_size_bytes {
                break;
            }
            if let Some(entry) = self.entries.remove(&key) {
                total -= entry.size_bytes;
                debug!(key = %key, size_bytes = entry.size_bytes, "evicted by size bound");
                evicted += 1;
            }
        }
        evicted
    }

    // == Stats ==
    /// Builds the report over entries that are live right now.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        CacheStats::build(
            self.entries
                .values()
                .filter(|entry| !entry.is_expired(now))
                .map(|entry| (entry.operation.as_str(), entry.size_bytes)),
            &self.counters,
        )
    }

    // == Accessors ==
    /// Returns the lifetime counters.
    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Returns the configured bounds.
    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Returns all physically present entries ordered by key.
    pub fn entries_by_key(&self) -> Vec<&CacheEntry> {
        let mut entries: Vec<&CacheEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Returns the sum of `size_bytes` over all present entries.
    pub fn total_size_bytes(&self) -> u64 {
        self.entries.values().map(|entry| entry.size_bytes).sum()
    }

    /// Reports and resets whether the entry map changed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // == Length ==
    /// Returns the current number of entries in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
