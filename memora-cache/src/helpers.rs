//! Helper functions for common cache operations.

use crate::error::{CacheError, CacheResult};
use crate::interceptor::{Expiration, Interception, on_entry, on_exit};
use crate::traits::StorageAdapter;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::time::Duration;

/// Read-through caching under an explicit key.
///
/// A hit refreshes the entry's expiry and skips `compute`. On a miss the
/// result of `compute` is stored unless it serializes to `null`. Errors from
/// `compute` are returned unchanged.
pub async fn memoize<S, T, E, F, Fut>(
    store: &S,
    key: &str,
    expiration: Expiration,
    compute: F,
) -> Result<T, E>
where
    S: StorageAdapter + ?Sized,
    T: Serialize + DeserializeOwned,
    E: From<CacheError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    memoize_traced(store, key, expiration, compute)
        .await
        .map(|(value, _)| value)
}

/// Like [`memoize`], also reporting whether the value was a hit.
pub async fn memoize_traced<S, T, E, F, Fut>(
    store: &S,
    key: &str,
    expiration: Expiration,
    compute: F,
) -> Result<(T, Interception), E>
where
    S: StorageAdapter + ?Sized,
    T: Serialize + DeserializeOwned,
    E: From<CacheError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(value) = on_entry(store, key, expiration).await? {
        return Ok((value, Interception::Hit));
    }

    let value = compute().await?;
    let outcome = on_exit(store, key, &value, expiration).await?;
    Ok((value, outcome))
}

/// Remember a value for a given duration.
///
/// If the key exists, returns the cached value.
/// If not, calls the factory function, caches the result, and returns it.
pub async fn remember<S, T, F, Fut>(
    store: &S,
    key: &str,
    ttl: Duration,
    factory: F,
) -> CacheResult<T>
where
    S: StorageAdapter + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    memoize(store, key, Expiration::After(ttl), factory).await
}

/// Remember a value forever (no TTL).
pub async fn remember_forever<S, T, F, Fut>(store: &S, key: &str, factory: F) -> CacheResult<T>
where
    S: StorageAdapter + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    memoize(store, key, Expiration::Never, factory).await
}
