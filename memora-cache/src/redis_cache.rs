//! Redis cache implementation.

use crate::config::{BackendKind, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::traits::StorageAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, info};

const SCAN_BATCH: usize = 500;

/// Redis cache store.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: CacheConfig,
}

impl RedisCache {
    /// Create a new Redis cache instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache configuration with a `redis://` location
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use memora_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::redis("redis://localhost:6379");
    ///     let cache = RedisCache::new(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let location = config.location.as_deref().ok_or_else(|| {
            CacheError::Config("Redis backend requires a location".to_string())
        })?;

        let client =
            Client::open(location).map_err(|e| CacheError::InvalidUrl(e.to_string()))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        info!(
            target: "memora::cache",
            backend = "redis",
            prefix = config.key_prefix.as_deref().unwrap_or(""),
            "Connected to Redis"
        );

        Ok(Self { connection, config })
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Build the full key with prefix.
    fn build_key(&self, key: &str) -> String {
        self.config.build_key(key)
    }
}

#[async_trait]
impl StorageAdapter for RedisCache {
    fn backend(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }

    async fn set_json(
        &self,
        key: &str,
        value: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> CacheResult<()> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        match expires_at {
            Some(expires_at) => {
                let remaining = (expires_at - Utc::now()).num_milliseconds();
                if remaining <= 0 {
                    let _: () = conn.del(&key).await?;
                } else {
                    let _: () = redis::cmd("SET")
                        .arg(&key)
                        .arg(value)
                        .arg("PX")
                        .arg(remaining)
                        .query_async(&mut conn)
                        .await?;
                }
            }
            None => {
                let _: () = conn.set(&key, value).await?;
            }
        }

        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let pattern = self.build_key(pattern);
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            found.extend(
                batch
                    .iter()
                    .map(|key| self.config.strip_key(key).to_string()),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        found.sort();
        found.dedup();
        debug!(target: "memora::cache", pattern = %pattern, count = found.len(), "Scanned keys");
        Ok(found)
    }

    async fn remove_all(&self, keys: &[&str]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = keys.iter().map(|key| self.build_key(key)).collect();
        let mut conn = self.connection.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
