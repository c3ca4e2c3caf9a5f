//! Memcached cache implementation.

use crate::config::{BackendKind, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::traits::StorageAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Longest relative expiration Memcached accepts; larger values are read as
/// unix timestamps.
const MAX_RELATIVE_EXPIRATION: i64 = 60 * 60 * 24 * 30;

/// Memcached cache store.
///
/// Note: The `memcache` crate doesn't have native async support,
/// so we wrap it with tokio's Mutex and use spawn_blocking for operations.
#[derive(Clone)]
pub struct MemcachedCache {
    client: Arc<Mutex<memcache::Client>>,
    config: CacheConfig,
}

impl MemcachedCache {
    /// Create a new Memcached cache instance.
    ///
    /// Connects to the configured location and every entry of the server list.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use memora_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::memcached("memcache://localhost:11211")
    ///         .with_server("cache-2.internal", 11211);
    ///     let cache = MemcachedCache::new(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let targets = config.memcached_targets()?;
        if targets.is_empty() {
            return Err(CacheError::Config(
                "Memcached backend requires a location or at least one server".to_string(),
            ));
        }

        let server_count = targets.len();
        let client = tokio::task::spawn_blocking(move || memcache::Client::connect(targets))
            .await?
            .map_err(|e| CacheError::BackendUnavailable(format!("Failed to connect: {}", e)))?;

        info!(
            target: "memora::cache",
            backend = "memcached",
            servers = server_count,
            "Connected to Memcached"
        );

        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            config,
        })
    }

    /// Build the full key with prefix.
    fn build_key(&self, key: &str) -> String {
        self.config.build_key(key)
    }

    /// Convert an absolute expiry to a Memcached expiration.
    ///
    /// `0` means no expiry. Deadlines further out than thirty days are sent
    /// as unix timestamps. `None` inside means the deadline already passed.
    fn expiration_for(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<u32> {
        let Some(expires_at) = expires_at else {
            return Some(0);
        };

        let remaining = (expires_at - now).num_seconds();
        if expires_at <= now {
            None
        } else if remaining > MAX_RELATIVE_EXPIRATION {
            Some(u32::try_from(expires_at.timestamp()).unwrap_or(u32::MAX))
        } else {
            Some(remaining.max(1) as u32)
        }
    }
}

#[async_trait]
impl StorageAdapter for MemcachedCache {
    fn backend(&self) -> BackendKind {
        BackendKind::Memcached
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.build_key(key);
        let client = self.client.clone();

        let value = tokio::task::spawn_blocking(move || {
            let client = client.blocking_lock();
            client.get::<String>(&key)
        })
        .await??;

        Ok(value)
    }

    async fn set_json(
        &self,
        key: &str,
        value: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> CacheResult<()> {
        let Some(expiration) = Self::expiration_for(expires_at, Utc::now()) else {
            return self.remove(key).await;
        };

        let key = self.build_key(key);
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || {
            let client = client.blocking_lock();
            client.set(&key, value, expiration)
        })
        .await??;

        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let key = self.build_key(key);
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || {
            let client = client.blocking_lock();
            client.delete(&key)
        })
        .await??;

        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        // Memcached doesn't have a native "exists" command
        let result = self.get_json(key).await?;
        Ok(result.is_some())
    }

    async fn clear(&self) -> CacheResult<()> {
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || {
            let client = client.blocking_lock();
            client.flush()
        })
        .await??;

        Ok(())
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Err(CacheError::Unsupported(
            "Memcached cannot enumerate keys".to_string(),
        ))
    }

    async fn remove_matching(&self, _pattern: &str) -> CacheResult<u64> {
        Err(CacheError::Unsupported(
            "Memcached cannot remove keys by pattern".to_string(),
        ))
    }
}
