//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{duration_to_ms, ResultCache};
use crate::config::CacheConfig;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between sweeps.
/// Each sweep takes the cache's store lock and writes through to disk when
/// anything was removed.
///
/// # Returns
/// A JoinHandle for the spawned task, which the host aborts on shutdown.
///
/// # Example
/// ```ignore
/// let cache = ResultCache::open(&config).await;
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: ResultCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = duration_to_ms(interval), "starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep().await;
            if removed > 0 {
                info!("expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("expiry sweep: no expired entries found");
            }
        }
    })
}

/// Spawns the sweep task at the interval configured in `config`.
///
/// Returns `None` without spawning anything when the interval is 0.
pub fn spawn_configured_sweep_task(
    cache: ResultCache,
    config: &CacheConfig,
) -> Option<JoinHandle<()>> {
    match config.sweep_interval() {
        Some(interval) => Some(spawn_sweep_task(cache, interval)),
        None => {
            info!("expiry sweep task disabled by configuration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::cache::ManualClock;

    fn cache() -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let cache = ResultCache::in_memory_with_clock(&CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let (cache, clock) = cache();
        cache
            .set("op", &json!({ "n": 1 }), &"short", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache
            .set("op", &json!({ "n": 2 }), &"long", Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));

        let handle = spawn_sweep_task(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nothing left for a manual sweep to do
        assert_eq!(cache.sweep().await, 0);
        assert_eq!(cache.stats().await.total_entries, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let (cache, _) = cache();

        let handle = spawn_sweep_task(cache, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }

    #[tokio::test]
    async fn test_configured_sweep_task_disabled_at_zero_interval() {
        let (cache, _) = cache();
        let config = CacheConfig {
            sweep_interval: 0,
            ..CacheConfig::default()
        };

        assert!(spawn_configured_sweep_task(cache, &config).is_none());
    }

    #[tokio::test]
    async fn test_configured_sweep_task_uses_config_interval() {
        let (cache, clock) = cache();
        cache
            .set("op", &json!({ "n": 1 }), &"short", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));

        // One second is the shortest configurable interval
        let config = CacheConfig {
            sweep_interval: 1,
            ..CacheConfig::default()
        };
        let handle = spawn_configured_sweep_task(cache.clone(), &config)
            .expect("nonzero interval should spawn the task");
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        // The task already removed the expired entry
        assert_eq!(cache.sweep().await, 0);
        handle.abort();
    }
}
