// Cache module.
// Key builders, cache backends and the cache-aside wrapper sitting in front of GitHub.

pub mod aside;
pub mod keys;
pub mod memory;
pub mod paths;
pub mod redis_store;
pub mod store;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use aside::CacheAside;
pub use keys::CacheKey;
pub use memory::{MemoryCache, NoopCache};
pub use redis_store::RedisCache;
pub use store::{CachedData, DiskCache};

/// Key/value store with per-key time-to-live.
///
/// Implementations must treat entries past their expiry as absent. Errors
/// should be reported as [`crate::error::PulseError::CacheUnavailable`].
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>>;

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()>;
}
