//! Persistence Module
//!
//! Mirrors the store to two JSON files: the entry data and the lifetime
//! statistics. Writes go to a temp file that is renamed into place.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::cache::{serialized_size, CacheCounters, CacheEntry, CacheKey, CacheStore};
use crate::error::PersistenceError;

/// File holding the entries.
pub const DATA_FILE_NAME: &str = "results.json";

/// File holding the lifetime counters.
pub const STATS_FILE_NAME: &str = "stats.json";

/// Current layout version of the data file.
pub const FORMAT_VERSION: u32 = 1;

// == File Layouts ==
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedData {
    version: u32,
    #[allow(dead_code)]
    last_updated: DateTime<Utc>,
    entries: Vec<(CacheKey, CacheEntry)>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedDataRef<'a> {
    version: u32,
    last_updated: DateTime<Utc>,
    entries: Vec<(&'a CacheKey, &'a CacheEntry)>,
}

// == Cache Persistence ==
/// On-disk mirror of a `CacheStore`.
///
/// Once a write fails the mirror switches itself off and every later save
/// reports `PersistenceError::Disabled`.
#[derive(Debug)]
pub struct CachePersistence {
    dir: PathBuf,
    data_path: PathBuf,
    stats_path: PathBuf,
    enabled: AtomicBool,
}

impl CachePersistence {
    // == Constructor ==
    /// Creates a mirror rooted at `dir`. Nothing is touched on disk yet.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            data_path: dir.join(DATA_FILE_NAME),
            stats_path: dir.join(STATS_FILE_NAME),
            dir,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }

    /// False after a failure switched the mirror off.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stops all further writes.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    // == Load ==
    /// Reads the persisted entries. A missing file is an empty cache.
    pub async fn load_entries(&self) -> Result<Vec<CacheEntry>, PersistenceError> {
        let Some(bytes) = read_if_exists(&self.data_path).await? else {
            return Ok(Vec::new());
        };

        let data: PersistedData =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
                path: self.data_path.clone(),
                source,
            })?;
        if data.version != FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                path: self.data_path.clone(),
                found: data.version,
            });
        }

        let entries = data
            .entries
            .into_iter()
            .filter_map(|(key, mut entry)| {
                if entry.expires_at <= entry.created_at {
                    warn!(key = %key, "skipping persisted entry with invalid timestamps");
                    return None;
                }
                entry.key = key;
                // The size bound must see the real size, not the recorded one
                entry.size_bytes = serialized_size(&entry.value);
                Some(entry)
            })
            .collect();
        Ok(entries)
    }

    /// Reads the persisted counters. A missing file means zeroed counters.
    pub async fn load_counters(&self) -> Result<CacheCounters, PersistenceError> {
        let Some(bytes) = read_if_exists(&self.stats_path).await? else {
            return Ok(CacheCounters::new());
        };

        serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
            path: self.stats_path.clone(),
            source,
        })
    }

    // == Save ==
    /// Writes the counters, and the entries too when `entries_changed`.
    pub async fn save(
        &self,
        store: &CacheStore,
        entries_changed: bool,
    ) -> Result<(), PersistenceError> {
        if !self.is_enabled() {
            return Err(PersistenceError::Disabled);
        }

        if entries_changed {
            let data = encode_entries(store, Utc::now())?;
            self.write_atomic(&self.data_path, &data).await?;
        }

        let counters =
            serde_json::to_vec_pretty(store.counters()).map_err(PersistenceError::Encode)?;
        self.write_atomic(&self.stats_path, &counters).await
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, bytes).await.map_err(io_err)?;
        fs::rename(&tmp_path, path).await.map_err(io_err)
    }
}

/// Encodes the data file with entries ordered by key.
fn encode_entries(store: &CacheStore, now: DateTime<Utc>) -> Result<Vec<u8>, PersistenceError> {
    let data = PersistedDataRef {
        version: FORMAT_VERSION,
        last_updated: now,
        entries: store
            .entries_by_key()
            .into_iter()
            .map(|entry| (&entry.key, entry))
            .collect(),
    };
    serde_json::to_vec_pretty(&data).map_err(PersistenceError::Encode)
}

async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
