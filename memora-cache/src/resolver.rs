//! Lazy, process-wide selection of the storage adapter.

use crate::config::{BackendKind, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::interceptor::{CacheInterceptor, Expiration};
use crate::memory::InMemoryCache;
use crate::null::NullCache;
use crate::traits::StorageAdapter;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Resolves the configured backend to a single shared adapter.
///
/// The adapter is constructed on first use. Concurrent first calls observe
/// the same instance; a failed construction is not remembered, so the next
/// call tries again.
///
/// # Examples
///
/// ```
/// use memora_cache::{AdapterResolver, BackendKind, CacheConfig, StorageAdapter};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), memora_cache::CacheError> {
/// let resolver = AdapterResolver::new(CacheConfig::memory())?;
/// let adapter = resolver.resolve().await?;
/// assert_eq!(adapter.backend(), BackendKind::Memory);
/// # Ok(())
/// # }
/// ```
pub struct AdapterResolver {
    config: CacheConfig,
    adapter: OnceCell<Arc<dyn StorageAdapter>>,
}

impl AdapterResolver {
    /// Create a resolver for a configuration.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            adapter: OnceCell::new(),
        })
    }

    /// Create a resolver from `MEMORA_CACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(CacheConfig::from_env()?)
    }

    /// Create a resolver from the `[cache]` section of a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        Self::new(CacheConfig::from_file(path)?)
    }

    /// Create a resolver around an already constructed adapter.
    pub fn with_adapter(config: CacheConfig, adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            config,
            adapter: OnceCell::new_with(Some(adapter)),
        }
    }

    /// The configuration this resolver was built from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the adapter has been constructed.
    pub fn is_resolved(&self) -> bool {
        self.adapter.initialized()
    }

    /// Get the shared adapter, constructing it on first call.
    pub async fn resolve(&self) -> CacheResult<Arc<dyn StorageAdapter>> {
        self.adapter
            .get_or_try_init(|| build_adapter(&self.config))
            .await
            .cloned()
    }

    /// Interceptor over the shared adapter with the default expiration.
    pub async fn interceptor(&self) -> CacheResult<CacheInterceptor> {
        self.interceptor_with(Expiration::default()).await
    }

    /// Interceptor over the shared adapter with an explicit expiration.
    pub async fn interceptor_with(&self, expiration: Expiration) -> CacheResult<CacheInterceptor> {
        let adapter = self.resolve().await?;
        Ok(CacheInterceptor::new(adapter).with_expiration(expiration))
    }
}

impl std::fmt::Debug for AdapterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterResolver")
            .field("config", &self.config)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

async fn build_adapter(config: &CacheConfig) -> CacheResult<Arc<dyn StorageAdapter>> {
    let adapter: Arc<dyn StorageAdapter> = match config.backend {
        BackendKind::Memory => Arc::new(InMemoryCache::new()),
        BackendKind::Null => Arc::new(NullCache::new()),
        #[cfg(feature = "redis")]
        BackendKind::Redis => Arc::new(crate::redis_cache::RedisCache::new(config.clone()).await?),
        #[cfg(not(feature = "redis"))]
        BackendKind::Redis => return Err(disabled(BackendKind::Redis, "redis")),
        #[cfg(feature = "memcached")]
        BackendKind::Memcached => {
            Arc::new(crate::memcached_cache::MemcachedCache::new(config.clone()).await?)
        }
        #[cfg(not(feature = "memcached"))]
        BackendKind::Memcached => return Err(disabled(BackendKind::Memcached, "memcached")),
    };

    info!(target: "memora::cache", backend = %adapter.backend(), "Storage adapter resolved");
    Ok(adapter)
}

#[cfg(any(not(feature = "redis"), not(feature = "memcached")))]
fn disabled(backend: BackendKind, feature: &str) -> CacheError {
    CacheError::Config(format!(
        "{} backend requires the `{}` feature of memora-cache",
        backend, feature
    ))
}
