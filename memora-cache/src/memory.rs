//! In-process cache backend.

use crate::config::BackendKind;
use crate::error::{CacheError, CacheResult};
use crate::traits::StorageAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory cache store.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    data: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

impl InMemoryCache {
    /// Create new in-memory cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Drop expired entries and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut data = self.data.write().await;
        let before = data.len();
        let now = Utc::now();
        data.retain(|_, entry| entry.is_live(now));
        before - data.len()
    }
}

/// Translate a `*`/`?` glob into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| CacheError::Config(format!("Invalid key pattern: {}", e)))
}

#[async_trait]
impl StorageAdapter for InMemoryCache {
    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set_json(
        &self,
        key: &str,
        value: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> CacheResult<()> {
        let mut data = self.data.write().await;

        if expires_at.is_some_and(|exp| exp <= Utc::now()) {
            data.remove(key);
            return Ok(());
        }

        data.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.get_json(key).await.map(|v| v.is_some())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let now = Utc::now();
        let data = self.data.read().await;

        let mut keys: Vec<String> = data
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn remove_all(&self, keys: &[&str]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write().await;
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }

    async fn remove_matching(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = glob_to_regex(pattern)?;
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|key, _| !matcher.is_match(key));
        Ok((before - data.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StorageAdapterExt;
    use chrono::Duration;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();
        cache.set_json("a", "1".to_string(), None).await.unwrap();

        assert_eq!(cache.get_json("a").await.unwrap(), Some("1".to_string()));
        assert!(cache.exists("a").await.unwrap());
        assert_eq!(cache.get_json("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_replaces_value_and_expiry() {
        let cache = InMemoryCache::new();
        let soon = Utc::now() + Duration::milliseconds(20);
        cache.set_json("a", "1".to_string(), Some(soon)).await.unwrap();
        cache.set_json("a", "2".to_string(), None).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert_eq!(cache.get_json("a").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_invisible() {
        let cache = InMemoryCache::new();
        let soon = Utc::now() + Duration::milliseconds(20);
        cache.set_json("a", "1".to_string(), Some(soon)).await.unwrap();
        assert!(cache.exists("a").await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert_eq!(cache.get_json("a").await.unwrap(), None);
        assert!(!cache.exists("a").await.unwrap());
        assert!(cache.keys("*").await.unwrap().is_empty());

        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_past_expiry_removes_key() {
        let cache = InMemoryCache::new();
        cache.set_json("a", "1".to_string(), None).await.unwrap();

        let past = Utc::now() - Duration::seconds(1);
        cache.set_json("a", "2".to_string(), Some(past)).await.unwrap();

        assert_eq!(cache.get_json("a").await.unwrap(), None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = InMemoryCache::new();
        cache.remove("missing").await.unwrap();

        cache.set_json("a", "1".to_string(), None).await.unwrap();
        cache.remove_all(&["a", "a", "missing"]).await.unwrap();
        cache.remove_all(&[]).await.unwrap();
        assert!(!cache.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_and_remove_matching() {
        let cache = InMemoryCache::new();
        for key in ["user:1", "user:2", "user:10", "order:1", "user.x"] {
            cache.set_json(key, "0".to_string(), None).await.unwrap();
        }

        assert_eq!(
            cache.keys("user:?").await.unwrap(),
            vec!["user:1".to_string(), "user:2".to_string()]
        );
        assert_eq!(cache.keys("user:*").await.unwrap().len(), 3);
        // `.` in a key is literal
        assert_eq!(cache.keys("user.*").await.unwrap(), vec!["user.x".to_string()]);

        assert_eq!(cache.remove_matching("user:*").await.unwrap(), 3);
        assert_eq!(cache.keys("*").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new();
        cache.set("a", &1).await.unwrap();
        cache.set("b", &2).await.unwrap();

        cache.clear().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_typed_access() {
        let cache = InMemoryCache::new();
        cache.set("numbers", &vec![1, 2, 3]).await.unwrap();

        let numbers: Option<Vec<i32>> = cache.get("numbers").await.unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        let wrong: CacheResult<Option<String>> = cache.get("numbers").await;
        assert!(matches!(wrong, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = InMemoryCache::new();
        let other = cache.clone();
        cache.set("shared", &true).await.unwrap();

        assert!(other.exists("shared").await.unwrap());
        assert_eq!(other.backend(), BackendKind::Memory);
    }
}
