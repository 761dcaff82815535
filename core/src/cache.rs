//! # TTL Cache
//!
//! A directory of JSON entry files, one per key. Entries are never evicted;
//! a `put` overwrites and expiry only changes how a read is classified.
//! Every write goes through a temp file in the same directory followed by
//! an fsync and a rename, so a reader sees either the old or the new entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lookout_common::error::{CacheError, FetchError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "json";
const READABLE_PREFIX_LEN: usize = 40;

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    fetched_at: DateTime<Utc>,
    ttl_ms: u64,
    payload: Value,
}

/// A cache hit. Stale entries are still returned.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    pub payload: T,
    pub fetched_at: DateTime<Utc>,
    pub age: Duration,
    pub is_fresh: bool,
}

/// How a value handed to a caller came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched and parsed during this call.
    Fresh,
    /// Served from a cache entry still inside its TTL; no network call was made.
    Cached { age: Duration },
    /// Served from an expired cache entry.
    Stale { age: Duration },
}

/// A value plus its provenance. `error` is set when a stale entry stands in
/// for a failed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired<T> {
    pub value: T,
    pub freshness: Freshness,
    pub error: Option<FetchError>,
}

impl<T> Acquired<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Fresh,
            error: None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }
}

impl<T: Clone> Acquired<T> {
    pub(crate) fn from_cached(cached: &CachedValue<T>) -> Self {
        let freshness = if cached.is_fresh {
            Freshness::Cached { age: cached.age }
        } else {
            Freshness::Stale { age: cached.age }
        };
        Self {
            value: cached.payload.clone(),
            freshness,
            error: None,
        }
    }
}

/// Falls back to whatever the cache held when a fetch failed.
pub(crate) fn stale_fallback<T>(cached: Option<CachedValue<T>>, error: FetchError) -> Result<Acquired<T>, FetchError> {
    match cached {
        Some(entry) => Ok(Acquired {
            value: entry.payload,
            freshness: Freshness::Stale { age: entry.age },
            error: Some(error),
        }),
        None => Err(error),
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    enabled: bool,
}

impl CacheStore {
    /// Opens (and creates) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("cache directory ready at {}", dir.display());
        Ok(Self { dir, enabled: true })
    }

    /// A store that never holds anything. Used when the cache directory
    /// cannot be created; fetches keep working without fallback.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, key: &str) -> Result<CachedValue<Value>, CacheError> {
        self.get_at(key, Utc::now())
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<CachedValue<T>, CacheError> {
        let raw = self.get(key)?;
        let payload = serde_json::from_value(raw.payload).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(CachedValue {
            payload,
            fetched_at: raw.fetched_at,
            age: raw.age,
            is_fresh: raw.is_fresh,
        })
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Result<CachedValue<Value>, CacheError> {
        if !self.enabled {
            return Err(CacheError::NotFound(key.to_string()));
        }

        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(key.to_string()));
            }
            Err(e) => return Err(CacheError::Storage(e)),
        };

        let entry: StoredEntry = serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        if entry.key != key {
            return Err(CacheError::NotFound(key.to_string()));
        }

        let age = (now - entry.fetched_at).to_std().unwrap_or(Duration::ZERO);
        let ttl = Duration::from_millis(entry.ttl_ms);
        Ok(CachedValue {
            payload: entry.payload,
            fetched_at: entry.fetched_at,
            age,
            is_fresh: age < ttl,
        })
    }

    pub fn put(&self, key: &str, payload: Value, ttl: Duration) -> Result<(), CacheError> {
        if !self.enabled {
            debug!("cache disabled, dropping write for {key}");
            return Ok(());
        }

        let entry = StoredEntry {
            key: key.to_string(),
            fetched_at: Utc::now(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            payload,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, &entry).map_err(io::Error::other)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn put_as<T: Serialize>(&self, key: &str, payload: &T, ttl: Duration) -> Result<(), CacheError> {
        let value = serde_json::to_value(payload).map_err(io::Error::other)?;
        self.put(key, value, ttl)
    }

    /// Removes one entry. Removing an absent entry is not an error.
    pub fn clear(&self, key: &str) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Storage(e)),
        }
    }

    /// Removes every entry file and returns how many were deleted.
    pub fn clear_all(&self) -> Result<usize, CacheError> {
        if !self.enabled {
            return Ok(0);
        }
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("could not remove cache file {}: {e}", path.display()),
                }
            }
        }
        Ok(removed)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXTENSION}", file_stem(key)))
    }
}

/// A readable prefix of the key followed by the SHA-256 of the whole key.
/// Only the digest part identifies the entry.
fn file_stem(key: &str) -> String {
    let prefix: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(READABLE_PREFIX_LEN)
        .collect();
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!("{prefix}-{digest}")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
