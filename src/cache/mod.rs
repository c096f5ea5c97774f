//! Cache Module
//!
//! Memoizes analysis results with per-operation TTLs, count and size bounds,
//! and a write-through JSON mirror on disk.

mod clock;
mod entry;
mod facade;
mod key;
mod persistence;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, duration_to_ms, Clock, ManualClock, SystemClock};
pub use entry::{serialized_size, CacheEntry};
pub use facade::ResultCache;
pub use key::{derive_key, CacheKey, DIGEST_PREFIX_LEN};
pub use persistence::{CachePersistence, DATA_FILE_NAME, FORMAT_VERSION, STATS_FILE_NAME};
pub use policy::{TtlPolicy, VolatilityTier, DEFAULT_TTL};
pub use stats::{hit_rate, CacheCounters, CacheStats, OperationCounters, OperationStats};
pub use store::{CacheStore, StoreLimits, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_SIZE_BYTES};
