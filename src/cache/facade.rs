//! Result Cache Facade
//!
//! Public get/set/clear/stats surface. Derives keys, resolves TTLs and keeps
//! the on-disk mirror in step with every mutation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{
    derive_key, CacheCounters, CachePersistence, CacheStats, CacheStore, Clock, SystemClock,
    TtlPolicy,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, PersistenceError, Result};

// == Result Cache ==
/// Memoizes operation results keyed by (operation, params).
///
/// Cheap to clone; clones share the same store. Every mutating call takes the
/// store lock and writes through to disk before returning. Persistence
/// failures are logged, after which the cache keeps working in memory only.
#[derive(Debug, Clone)]
pub struct ResultCache {
    /// Entry store behind the single mutation lock
    store: Arc<Mutex<CacheStore>>,
    /// Disk mirror, `None` for in-memory caches
    persistence: Option<Arc<CachePersistence>>,
    /// TTL resolution table
    policy: Arc<TtlPolicy>,
}

impl ResultCache {
    // == Constructors ==
    /// Opens the cache persisted under `config.cache_dir`.
    pub async fn open(config: &CacheConfig) -> Self {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Opens a persisted cache that reads time from `clock`.
    ///
    /// Corrupt files are discarded and the cache starts empty. An unreadable
    /// directory switches the cache to memory-only for the process lifetime.
    pub async fn open_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let persistence = CachePersistence::new(&config.cache_dir);

        let entries = match persistence.load_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                discard_or_disable(&persistence, &err);
                Vec::new()
            }
        };
        let counters = match persistence.load_counters().await {
            Ok(counters) => counters,
            Err(err) => {
                discard_or_disable(&persistence, &err);
                CacheCounters::new()
            }
        };

        let store = CacheStore::hydrate(entries, counters, config.limits(), clock);
        info!(
            entries = store.len(),
            size_bytes = store.total_size_bytes(),
            dir = %config.cache_dir.display(),
            "result cache loaded"
        );

        let cache = Self {
            store: Arc::new(Mutex::new(store)),
            persistence: Some(Arc::new(persistence)),
            policy: Arc::new(TtlPolicy::new(config.default_ttl())),
        };
        {
            let mut store = cache.store.lock().await;
            if store.take_dirty() {
                cache.write_through(&store, true).await;
            }
        }
        cache
    }

    /// Creates a cache that never touches the filesystem.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::in_memory_with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a memory-only cache that reads time from `clock`.
    pub fn in_memory_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(Mutex::new(CacheStore::new(config.limits(), clock))),
            persistence: None,
            policy: Arc::new(TtlPolicy::new(config.default_ttl())),
        }
    }

    /// Replaces the TTL policy.
    pub fn with_policy(mut self, policy: TtlPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    // == Get ==
    /// Returns the cached result of `operation` for `params`.
    ///
    /// `Ok(None)` is a miss; a cached `false`, `0` or `null` comes back as
    /// `Ok(Some(..))`.
    ///
    /// # Errors
    /// `CacheError::Serialization` if `params` is not JSON-representable.
    pub async fn get<P>(&self, operation: &str, params: &P) -> Result<Option<Value>>
    where
        P: Serialize + ?Sized,
    {
        let key = derive_key(operation, params)?;

        let mut store = self.store.lock().await;
        let hit = store.lookup(&key);
        let entries_changed = store.take_dirty();
        self.write_through(&store, entries_changed).await;

        Ok(hit.map(|entry| entry.value))
    }

    // == Set ==
    /// Memoizes `value` as the result of `operation` for `params`.
    ///
    /// The TTL is `ttl`, else the policy entry for `operation`, else the
    /// default. Any previous entry for the same key is replaced.
    ///
    /// # Errors
    /// `CacheError::Serialization` if `params` or `value` is not
    /// JSON-representable.
    pub async fn set<P, V>(
        &self,
        operation: &str,
        params: &P,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = derive_key(operation, params)?;
        let value = serde_json::to_value(value).map_err(|source| CacheError::Serialization {
            operation: operation.to_string(),
            source,
        })?;
        let ttl = self.policy.resolve(operation, ttl);

        let mut store = self.store.lock().await;
        let evicted = store.insert(key, operation, value, ttl);
        if evicted > 0 {
            debug!(operation, evicted, "limits enforced after insert");
        }
        let entries_changed = store.take_dirty();
        self.write_through(&store, entries_changed).await;
        Ok(())
    }

    // == Get Or Compute ==
    /// Returns the cached result, or runs `compute`, caches its output with
    /// the policy TTL and returns it.
    ///
    /// A cached value that no longer deserializes as `V` is recomputed.
    /// Errors from `compute` are returned without caching anything.
    pub async fn get_or_compute<P, V, F, Fut, E>(
        &self,
        operation: &str,
        params: &P,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        P: Serialize + ?Sized,
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: From<CacheError>,
    {
        if let Some(cached) = self.get(operation, params).await? {
            match serde_json::from_value(cached) {
                Ok(value) => return Ok(value),
                Err(err) => warn!(operation, error = %err, "cached value has unexpected shape"),
            }
        }

        let value = compute().await?;
        self.set(operation, params, &value, None).await?;
        Ok(value)
    }

    // == Clear ==
    /// Removes every entry of `operation`, or everything when `None`.
    ///
    /// Lifetime statistics are kept. Returns the number of entries removed.
    pub async fn clear(&self, operation: Option<&str>) -> usize {
        let mut store = self.store.lock().await;
        let removed = match operation {
            Some(operation) => store.remove_by_operation(operation),
            None => store.remove_all(),
        };
        if store.take_dirty() {
            self.write_through(&store, true).await;
        }

        info!(operation = operation.unwrap_or("*"), removed, "result cache cleared");
        removed
    }

    // == Sweep ==
    /// Removes expired entries and returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut store = self.store.lock().await;
        let removed = store.sweep_expired();
        if store.take_dirty() {
            self.write_through(&store, true).await;
        }
        removed
    }

    // == Stats ==
    /// Sweeps expired entries, then reports on what is live.
    pub async fn stats(&self) -> CacheStats {
        let mut store = self.store.lock().await;
        store.sweep_expired();
        if store.take_dirty() {
            self.write_through(&store, true).await;
        }
        store.stats()
    }

    // == Flush ==
    /// Writes the full state to disk and reports any failure.
    ///
    /// Memory-only caches succeed without doing anything.
    pub async fn flush(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        let mut store = self.store.lock().await;
        store.take_dirty();
        persistence.save(&store, true).await?;
        Ok(())
    }

    // == Accessors ==
    /// True while writes still reach disk.
    pub fn is_persistent(&self) -> bool {
        self.persistence
            .as_ref()
            .is_some_and(|persistence| persistence.is_enabled())
    }

    /// TTL that a `set` without a custom TTL would use for `operation`.
    pub fn ttl_for(&self, operation: &str) -> Duration {
        self.policy.resolve(operation, None)
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Writes through to disk. Failures switch persistence off for good.
    async fn write_through(&self, store: &CacheStore, entries_changed: bool) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if !persistence.is_enabled() {
            return;
        }

        if let Err(err) = persistence.save(store, entries_changed).await {
            warn!(error = %err, "result cache persistence failed, continuing in memory only");
            persistence.disable();
        }
    }
}

/// Load-time error policy: corrupt content is dropped, I/O trouble disables
/// persistence.
fn discard_or_disable(persistence: &CachePersistence, err: &PersistenceError) {
    if err.is_corrupt_state() {
        warn!(error = %err, "discarding corrupt result cache state");
    } else {
        warn!(error = %err, "result cache unreadable, continuing in memory only");
        persistence.disable();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;

    fn cache_with_clock() -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = ResultCache::in_memory_with_clock(&CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (cache, _) = cache_with_clock();

        cache
            .set("securityAudit", &json!({ "path": "/x" }), &json!({ "score": 90 }), None)
            .await
            .unwrap();

        let value = cache.get("securityAudit", &json!({ "path": "/x" })).await.unwrap();
        assert_eq!(value, Some(json!({ "score": 90 })));
    }

    #[tokio::test]
    async fn test_miss_is_distinct_from_falsy_value() {
        let (cache, _) = cache_with_clock();

        cache.set("flag", &json!({}), &false, None).await.unwrap();

        assert_eq!(cache.get("flag", &json!({})).await.unwrap(), Some(json!(false)));
        assert_eq!(cache.get("flag", &json!({ "other": 1 })).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_policy_ttl_applies() {
        let (cache, clock) = cache_with_clock();

        cache.set("callers", &json!({ "symbol": "f" }), &json!([]), None).await.unwrap();
        cache.set("i18nCoverage", &json!({}), &json!(0.8), None).await.unwrap();

        clock.advance(Duration::from_secs(5 * 60));
        assert_eq!(cache.get("callers", &json!({ "symbol": "f" })).await.unwrap(), None);
        assert!(cache.get("i18nCoverage", &json!({})).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_custom_ttl_wins() {
        let (cache, clock) = cache_with_clock();

        cache
            .set("i18nCoverage", &json!({}), &json!(1), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("i18nCoverage", &json!({})).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_by_operation() {
        let (cache, _) = cache_with_clock();

        cache.set("a", &json!({ "n": 1 }), &1, None).await.unwrap();
        cache.set("a", &json!({ "n": 2 }), &2, None).await.unwrap();
        cache.set("b", &json!({ "n": 1 }), &3, None).await.unwrap();

        assert_eq!(cache.clear(Some("a")).await, 2);
        assert_eq!(cache.stats().await.total_entries, 1);
        assert_eq!(cache.clear(None).await, 1);
        assert_eq!(cache.clear(None).await, 0);
    }

    #[tokio::test]
    async fn test_stats_hit_rate() {
        let (cache, _) = cache_with_clock();
        assert_eq!(cache.stats().await.hit_rate, 0.0);

        cache.set("op", &json!({}), &1, None).await.unwrap();
        cache.get("op", &json!({})).await.unwrap();
        cache.get("op", &json!({})).await.unwrap();
        cache.get("op", &json!({ "x": 1 })).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.total_hits, 2);
        assert_eq!(stats.total_misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(stats.operations["op"].entries, 1);
    }

    #[tokio::test]
    async fn test_stats_sweeps_expired() {
        let (cache, clock) = cache_with_clock();

        cache.set("op", &json!({}), &1, Some(Duration::from_secs(1))).await.unwrap();
        clock.advance(Duration::from_secs(1));

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert_eq!(cache.sweep().await, 0, "Stats should already have swept");
    }

    #[tokio::test]
    async fn test_get_or_compute() {
        let (cache, _) = cache_with_clock();
        let mut calls = 0;

        for _ in 0..3 {
            let value: Vec<String> = cache
                .get_or_compute("todoScan", &json!({ "dir": "src" }), || {
                    calls += 1;
                    async { Ok::<_, CacheError>(vec!["TODO".to_string()]) }
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["TODO".to_string()]);
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_does_not_cache_errors() {
        let (cache, _) = cache_with_clock();

        #[derive(Debug)]
        enum ScanError {
            Failed,
            Cache,
        }
        impl From<CacheError> for ScanError {
            fn from(_: CacheError) -> Self {
                ScanError::Cache
            }
        }

        let result: std::result::Result<u32, ScanError> = cache
            .get_or_compute("scan", &json!({}), || async { Err(ScanError::Failed) })
            .await;
        assert!(matches!(result, Err(ScanError::Failed)));
        assert_eq!(cache.get("scan", &json!({})).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_serialization_error_propagates() {
        let (cache, _) = cache_with_clock();
        let mut params = std::collections::HashMap::new();
        params.insert((1, 2), "tuple keys are not JSON");

        assert!(matches!(
            cache.get("op", &params).await,
            Err(CacheError::Serialization { .. })
        ));
        assert!(matches!(
            cache.set("op", &json!({}), &params, None).await,
            Err(CacheError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_in_memory_is_not_persistent() {
        let (cache, _) = cache_with_clock();
        assert!(!cache.is_persistent());
        assert!(cache.flush().await.is_ok());
        assert_eq!(cache.ttl_for("unknownOp"), Duration::from_secs(900));
    }

    #[tokio::test]
    async fn test_with_policy() {
        let (cache, _) = cache_with_clock();
        let cache = cache.with_policy(
            TtlPolicy::new(Duration::from_secs(1)).with_override("x", Duration::from_secs(2)),
        );
        assert_eq!(cache.ttl_for("x"), Duration::from_secs(2));
        assert_eq!(cache.policy().default_ttl(), Duration::from_secs(1));
    }
}
