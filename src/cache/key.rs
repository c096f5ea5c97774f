//! Key Deriver Module
//!
//! Turns an (operation, params) pair into a stable, human-readable cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Number of hex characters of the SHA-256 digest kept in a key.
pub const DIGEST_PREFIX_LEN: usize = 16;

// == Cache Key ==
/// Derived cache key of the form `<operation>:<digest-prefix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already-derived key string, e.g. one read back from disk.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the operation prefix.
    ///
    /// The digest never contains `:`, so the last separator splits the key even
    /// when the operation name itself contains one.
    pub fn operation(&self) -> &str {
        self.0
            .rsplit_once(':')
            .map(|(operation, _)| operation)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Derive Key ==
/// Derives the cache key for `operation` called with `params`.
///
/// `params` may be any serializable value. `null` (or `()`) is treated as an
/// empty object, and object keys are sorted at every depth before hashing, so
/// two parameter objects that differ only in field order share a key.
///
/// # Errors
/// Returns `CacheError::Serialization` if `params` cannot be turned into JSON,
/// for example a map with non-string keys.
pub fn derive_key<P>(operation: &str, params: &P) -> Result<CacheKey>
where
    P: Serialize + ?Sized,
{
    let params = serde_json::to_value(params).map_err(|source| CacheError::Serialization {
        operation: operation.to_string(),
        source,
    })?;
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => canonicalize(other),
    };

    let canonical = json!({ "operation": operation, "params": params });
    let encoded = serde_json::to_vec(&canonical).map_err(|source| CacheError::Serialization {
        operation: operation.to_string(),
        source,
    })?;

    let digest = hex::encode(Sha256::digest(&encoded));
    Ok(CacheKey(format!(
        "{}:{}",
        operation,
        &digest[..DIGEST_PREFIX_LEN]
    )))
}

/// Rebuilds every object with sorted keys so serialization is order-stable
/// regardless of how serde_json's map is configured.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
