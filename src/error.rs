//! Error types for the result cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the result cache.
///
/// Only serialization problems reach callers of `get`/`set`. Persistence
/// failures are logged and swallowed there, and only surface through explicit
/// calls such as `ResultCache::flush`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Params or value could not be represented as JSON
    #[error("Serialization failed for operation '{operation}': {source}")]
    Serialization {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the persisted files failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

// == Persistence Error Enum ==
/// Failure modes of the on-disk mirror.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exists but does not parse
    #[error("Corrupt cache file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// File parses but was written by an incompatible format version
    #[error("Unsupported cache file version {found} in {path}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    /// In-memory state could not be encoded
    #[error("Failed to encode cache state: {0}")]
    Encode(#[source] serde_json::Error),

    /// Persistence was switched off after an earlier failure
    #[error("Persistence disabled after an earlier failure")]
    Disabled,
}

impl PersistenceError {
    /// True when the error means the file content should be discarded rather
    /// than the filesystem being unusable.
    pub fn is_corrupt_state(&self) -> bool {
        matches!(
            self,
            PersistenceError::Corrupt { .. } | PersistenceError::UnsupportedVersion { .. }
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the result cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_state_classification() {
        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let corrupt = PersistenceError::Corrupt {
            path: PathBuf::from("results.json"),
            source: bad_json,
        };
        assert!(corrupt.is_corrupt_state());

        let version = PersistenceError::UnsupportedVersion {
            path: PathBuf::from("results.json"),
            found: 7,
        };
        assert!(version.is_corrupt_state());

        let io = PersistenceError::Io {
            path: PathBuf::from("results.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!io.is_corrupt_state());
        assert!(!PersistenceError::Disabled.is_corrupt_state());
    }

    #[test]
    fn test_persistence_error_converts_into_cache_error() {
        let err: CacheError = PersistenceError::Disabled.into();
        assert!(matches!(err, CacheError::Persistence(PersistenceError::Disabled)));
        assert_eq!(err.to_string(), "Persistence disabled after an earlier failure");
    }
}
