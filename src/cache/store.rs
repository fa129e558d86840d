// On-disk cache store.
// One JSON file per key with expiry metadata, written atomically via a temp file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::error::{PulseError, Result};

use super::Cache;
use super::keys::CacheKey;
use super::paths::entry_path;

/// Distinguishes temp files of concurrent writes within this process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Wrapper for cached data with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was cached.
    pub cached_at: DateTime<Utc>,
    /// When the data stops being served.
    pub expires_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    /// Create a new cached data entry that lives for `ttl`.
    pub fn new(data: T, ttl: Duration) -> Self {
        let cached_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| cached_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            data,
            cached_at,
            expires_at,
        }
    }

    /// Check if this entry has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if this entry is still valid (not expired).
    pub fn is_valid(&self) -> bool {
        !self.is_expired_at(Utc::now())
    }
}

/// Cache backed by JSON files in a directory. Survives restarts.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Delete every cached entry.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&self.root, e)),
        }
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let path = entry_path(&self.root, key.as_str());

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };

        let cached: CachedData<Value> = match serde_json::from_str(&contents) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if cached.is_valid() {
            Ok(Some(cached.data))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| unavailable(&self.root, e))?;

        let path = entry_path(&self.root, key.as_str());
        let json = serde_json::to_string(&CachedData::new(value, ttl))?;

        // Write atomically via a temp file of our own; the last rename wins
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("{}-{}.tmp", process::id(), seq));
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| unavailable(&temp_path, e))?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(unavailable(&path, e));
        }

        Ok(())
    }
}

fn unavailable(path: &Path, error: std::io::Error) -> PulseError {
    PulseError::CacheUnavailable(format!("{}: {}", path.display(), error))
}
