//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Required backend configuration is absent
    #[error("Cache configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Configuration is present but unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid backend location
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The backend could not be reached or rejected the command
    #[error("Cache backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Operation the backend cannot express
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl CacheError {
    /// Whether the error came from the backend rather than from local setup.
    pub fn is_backend(&self) -> bool {
        matches!(self, CacheError::BackendUnavailable(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::BackendUnavailable(format!("redis: {}", err))
    }
}

#[cfg(feature = "memcached")]
impl From<memcache::MemcacheError> for CacheError {
    fn from(err: memcache::MemcacheError) -> Self {
        CacheError::BackendUnavailable(format!("memcached: {}", err))
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::BackendUnavailable(format!("Task join error: {}", err))
    }
}
