// Redis cache store.
// Entries live in Redis with a native expiry. The connection is opened on first use.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{PulseError, Result};

use super::Cache;
use super::keys::CacheKey;

/// Cache shared through a Redis server, so several processes see the same entries.
pub struct RedisCache {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisCache {
    /// Parse `url`. No connection is made until the first read or write.
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| PulseError::Configuration(format!("invalid Redis URL {}: {}", url, e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    /// Shared connection, opened on first call. A failed attempt is retried next call.
    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(Duration::from_millis(500));

                let manager = self
                    .client
                    .get_connection_manager_with_config(config)
                    .await?;
                info!("Connected to Redis");
                Ok::<_, redis::RedisError>(manager)
            })
            .await
            .map_err(unavailable)?;

        Ok(manager.clone())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let mut connection = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .map_err(unavailable)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring corrupt Redis entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()> {
        let mut connection = self.connection().await?;
        let json = serde_json::to_string(&value)?;
        // PX needs a positive value
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        redis::cmd("SET")
            .arg(key.as_str())
            .arg(json)
            .arg("PX")
            .arg(millis)
            .query_async::<()>(&mut connection)
            .await
            .map_err(unavailable)
    }
}

fn unavailable(error: redis::RedisError) -> PulseError {
    PulseError::CacheUnavailable(format!("redis: {}", error))
}
