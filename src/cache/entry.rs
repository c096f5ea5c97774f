//! Cache Entry Module
//!
//! Defines the structure for individual memoized results with TTL support.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{duration_to_ms, CacheKey};

// == Cache Entry ==
/// A memoized operation result and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Derived key, unique per (operation, params)
    pub key: CacheKey,
    /// Operation that produced the value
    pub operation: String,
    /// The memoized result
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), always after `created_at`
    pub expires_at: u64,
    /// Length of the serialized value in bytes
    pub size_bytes: u64,
    /// Number of non-expired lookups served by this entry
    pub hit_count: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry created at `now_ms` that lives for `ttl`.
    ///
    /// A zero TTL is rounded up to one millisecond so that
    /// `expires_at > created_at` always holds.
    pub fn new(
        key: CacheKey,
        operation: impl Into<String>,
        value: Value,
        ttl: Duration,
        now_ms: u64,
    ) -> Self {
        let ttl_ms = duration_to_ms(ttl).max(1);
        let size_bytes = serialized_size(&value);

        Self {
            key,
            operation: operation.into(),
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms),
            size_bytes,
            hit_count: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is live strictly before `expires_at`; at the boundary it is
    /// already expired.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Record Hit ==
    /// Counts one successful lookup.
    pub fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(now_ms))
    }
}

/// Byte length of the JSON encoding of `value`.
pub fn serialized_size(value: &Value) -> u64 {
    // Encoding a `Value` only fails for non-finite floats, which `Value`
    // cannot hold.
    serde_json::to_vec(value)
        .map(|bytes| bytes.len() as u64)
        .unwrap_or_default()
}
