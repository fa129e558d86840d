// In-process cache stores.
// A moka cache with per-entry TTL shared across tasks, and a no-op store for when caching is off.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use serde_json::Value;

use crate::error::Result;

use super::Cache;
use super::keys::CacheKey;

/// Upper bound on entries held in memory.
const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    data: Value,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with. A rewrite restarts the clock.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// TTL cache held in memory. Lost on restart.
pub struct MemoryCache {
    entries: MokaCache<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: MokaCache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(EntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        Ok(self.entries.get(key.as_str()).await.map(|entry| entry.data))
    }

    async fn set(&self, key: &CacheKey, data: Value, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.as_str().to_string(), Entry { data, ttl })
            .await;
        Ok(())
    }
}

/// Cache that stores nothing. Every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn set(&self, _key: &CacheKey, _value: Value, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}
