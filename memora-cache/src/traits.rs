//! Storage adapter trait definition.

use crate::config::BackendKind;
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

/// Storage adapter trait for different cache backends.
///
/// Payloads are JSON strings; typed access lives in [`StorageAdapterExt`].
/// Any operation may fail with [`CacheError::BackendUnavailable`].
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Which backend this adapter talks to.
    fn backend(&self) -> BackendKind;

    /// Get a JSON value from the cache.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(value))` if the key exists and has not expired,
    /// `Ok(None)` if not found, or an error if the operation fails.
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a JSON value in the cache.
    ///
    /// Replaces any existing entry under `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The JSON string value
    /// * `expires_at` - Absolute expiry; `None` never expires. An expiry in
    ///   the past leaves the key absent.
    async fn set_json(
        &self,
        key: &str,
        value: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> CacheResult<()>;

    /// Delete a key from the cache.
    async fn remove(&self, key: &str) -> CacheResult<()>;

    /// Check if a key exists in the cache.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Clear all keys managed by this adapter.
    ///
    /// **Warning:** on network backends this flushes the whole database or
    /// server, not only the keys written through this adapter.
    async fn clear(&self) -> CacheResult<()>;

    /// List keys matching a glob pattern (`*` and `?` wildcards).
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Delete multiple keys.
    ///
    /// Duplicate keys are tolerated and an empty slice is a no-op.
    async fn remove_all(&self, keys: &[&str]) -> CacheResult<()> {
        use futures::future::try_join_all;

        if keys.is_empty() {
            return Ok(());
        }

        let futures = keys.iter().map(|key| self.remove(key));
        try_join_all(futures).await?;
        Ok(())
    }

    /// Delete every key matching a glob pattern.
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    async fn remove_matching(&self, pattern: &str) -> CacheResult<u64> {
        let keys = self.keys(pattern).await?;
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.remove_all(&refs).await?;
        Ok(keys.len() as u64)
    }
}

/// Typed access on top of any [`StorageAdapter`].
#[async_trait]
pub trait StorageAdapterExt: StorageAdapter {
    /// Get a typed value from the cache.
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_json(key).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Set a typed value that never expires.
    async fn set<T>(&self, key: &str, value: &T) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let json =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_json(key, json, None).await
    }

    /// Set a typed value that expires at `expires_at`.
    async fn set_until<T>(&self, key: &str, value: &T, expires_at: DateTime<Utc>) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let json =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_json(key, json, Some(expires_at)).await
    }
}

impl<S: StorageAdapter + ?Sized> StorageAdapterExt for S {}
