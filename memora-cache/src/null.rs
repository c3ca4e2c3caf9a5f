//! Backend that stores nothing.

use crate::config::BackendKind;
use crate::error::CacheResult;
use crate::traits::StorageAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Cache store that never holds a value.
///
/// Every read misses and every write is dropped, so memoized methods always
/// run their body. Useful for disabling caching through configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl NullCache {
    /// Create a new null store.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageAdapter for NullCache {
    fn backend(&self) -> BackendKind {
        BackendKind::Null
    }

    async fn get_json(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set_json(
        &self,
        _key: &str,
        _value: String,
        _expires_at: Option<DateTime<Utc>>,
    ) -> CacheResult<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn clear(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn remove_matching(&self, _pattern: &str) -> CacheResult<u64> {
        Ok(0)
    }
}
