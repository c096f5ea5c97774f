//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{StoreLimits, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_SIZE_BYTES};

/// Default directory holding the persisted files.
pub const DEFAULT_CACHE_DIR: &str = ".result-cache";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the data and statistics files
    pub cache_dir: PathBuf,
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum total serialized size of live entries, in bytes
    pub max_size_bytes: u64,
    /// TTL in seconds for operations missing from the policy table
    pub default_ttl: u64,
    /// Background sweep interval in seconds, 0 disables the sweep task
    pub sweep_interval: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RESULT_CACHE_DIR` - Cache directory (default: .result-cache)
    /// - `RESULT_CACHE_MAX_ENTRIES` - Maximum live entries (default: 1000)
    /// - `RESULT_CACHE_MAX_SIZE_BYTES` - Maximum total size (default: 100 MiB)
    /// - `RESULT_CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 900)
    /// - `RESULT_CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env::var_os("RESULT_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            max_entries: parse_var("RESULT_CACHE_MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_size_bytes: parse_var("RESULT_CACHE_MAX_SIZE_BYTES")
                .unwrap_or(defaults.max_size_bytes),
            default_ttl: parse_var("RESULT_CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            sweep_interval: parse_var("RESULT_CACHE_SWEEP_INTERVAL")
                .unwrap_or(defaults.sweep_interval),
        }
    }

    /// Returns a copy pointing at another directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Store bounds derived from this configuration.
    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            max_entries: self.max_entries,
            max_size_bytes: self.max_size_bytes,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Background sweep period, `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_entries: DEFAULT_MAX_ENTRIES,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            default_ttl: 15 * 60,
            sweep_interval: 60,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
