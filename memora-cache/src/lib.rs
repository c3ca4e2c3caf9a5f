//! Method-level memoization for Memora.
//!
//! Results of expensive calls are cached under a key derived from the
//! method's identity and its serialized arguments, in whichever backend the
//! configuration selects.
//!
//! # Features
//!
//! - `redis` - Enable Redis cache support (enabled by default)
//! - `memcached` - Enable Memcached cache support (requires explicit opt-in)
//! - **Deterministic keys** - `{type}.{method}({md5 of signature and arguments})`
//! - **Pluggable backends** - in-memory, Redis, Memcached, or a null store
//! - **Call interception** - `CacheInterceptor::memoize` or the `#[cached]` attribute
//!
//! # Examples
//!
//! ## Memoizing a call
//!
//! ```
//! use memora_cache::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), CacheError> {
//! let resolver = AdapterResolver::new(CacheConfig::memory())?;
//! let interceptor = resolver.interceptor_with(Expiration::minutes(10)).await?;
//!
//! let descriptor = MethodDescriptor::new("catalog::Search", "run")
//!     .with_param_of::<String>("query");
//! let arguments = InvocationArguments::new().with("red shoes");
//!
//! let hits: Vec<u32> = interceptor
//!     .memoize(&descriptor, &arguments, || async { Ok::<_, CacheError>(vec![17, 42]) })
//!     .await?;
//! assert_eq!(hits, vec![17, 42]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Redis Cache
//!
//! ```no_run
//! use memora_cache::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let config = CacheConfig::redis("redis://localhost:6379").with_key_prefix("shop");
//!     let cache = RedisCache::new(config).await?;
//!
//!     cache.set("user:1", "Alice").await?;
//!     let name: Option<String> = cache.get("user:1").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Memcached Cache (requires `memcached` feature)
//!
//! ```ignore
//! use memora_cache::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let config = CacheConfig::memcached("memcache://localhost:11211");
//!     let cache = MemcachedCache::new(config).await?;
//!
//!     cache.set("key", "value").await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod helpers;
pub mod interceptor;
pub mod key;
pub mod memory;
pub mod null;
pub mod resolver;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "memcached")]
pub mod memcached_cache;

pub use config::{BackendKind, CacheConfig, ServerAddress};
pub use error::{CacheError, CacheResult};
pub use helpers::*;
pub use interceptor::{CacheAware, CacheInterceptor, DEFAULT_EXPIRATION, Expiration, Interception};
pub use key::{CacheKey, InvocationArguments, KeyBuilder, MethodDescriptor, ParameterDescriptor};
pub use memory::InMemoryCache;
pub use null::NullCache;
pub use resolver::AdapterResolver;
pub use traits::{StorageAdapter, StorageAdapterExt};

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

#[cfg(feature = "memcached")]
pub use memcached_cache::MemcachedCache;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{BackendKind, CacheConfig};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::interceptor::{CacheAware, CacheInterceptor, Expiration, Interception};
    pub use crate::key::{CacheKey, InvocationArguments, KeyBuilder, MethodDescriptor};
    pub use crate::memory::InMemoryCache;
    pub use crate::null::NullCache;
    pub use crate::resolver::AdapterResolver;
    pub use crate::traits::{StorageAdapter, StorageAdapterExt};

    #[cfg(feature = "redis")]
    pub use crate::redis_cache::RedisCache;

    #[cfg(feature = "memcached")]
    pub use crate::memcached_cache::MemcachedCache;
}
