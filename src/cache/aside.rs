// Cache-aside wrapper.
// Checks the cache, computes on a miss and writes back. Cache trouble never fails the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::Result;

use super::keys::CacheKey;
use super::memory::NoopCache;
use super::Cache;

/// Cache-aside access to a shared cache backend.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn Cache>,
    /// When false, lookups always miss but results are still written.
    reads: bool,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache, reads: true }
    }

    /// Caching switched off: always recompute.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache))
    }

    /// Same backend, but every lookup misses. Used to overwrite entries on refresh.
    pub fn write_only(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            reads: false,
        }
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// A failing `compute` propagates and nothing is stored. A failing store
    /// is logged and the computed value is still returned.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }

        debug!("Cache miss for key: {}", key);
        let value = compute().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    /// Read `key`, treating backend failures and undecodable values as misses.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.reads {
            return None;
        }

        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Cache read failed for {}, recomputing: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value(raw) {
            Ok(value) => {
                debug!("Cache hit for key: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Write `value` under `key`. Best effort.
    pub async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot serialize value for {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.cache.set(key, raw, ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}
