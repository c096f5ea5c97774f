//! Result Cache - memoization for expensive analysis operations
//!
//! Stores operation results keyed by (operation, params) with per-operation
//! TTLs, count and size bounds, and a write-through JSON mirror on disk.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, ResultCache, TtlPolicy};
pub use config::CacheConfig;
pub use error::{CacheError, PersistenceError};
pub use tasks::{spawn_configured_sweep_task, spawn_sweep_task};
