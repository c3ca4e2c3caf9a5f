//! Call interception: serve a cached result or run the body and store it.

use crate::error::CacheError;
use crate::helpers;
use crate::key::{CacheKey, InvocationArguments, KeyBuilder, MethodDescriptor};
use crate::traits::StorageAdapter;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default lifetime of a memoized result.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// How long a memoized result stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// Expire this long after the last store or hit.
    After(Duration),
    /// Never expire.
    Never,
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::After(DEFAULT_EXPIRATION)
    }
}

impl Expiration {
    /// Expire after `minutes` minutes.
    pub fn minutes(minutes: u64) -> Self {
        Expiration::After(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Expire after `seconds` seconds.
    pub fn seconds(seconds: u64) -> Self {
        Expiration::After(Duration::from_secs(seconds))
    }

    /// Map a signed minute count; any negative value (conventionally `-1`)
    /// means never expire.
    ///
    /// # Examples
    ///
    /// ```
    /// use memora_cache::Expiration;
    ///
    /// assert_eq!(Expiration::from_minutes(-1), Expiration::Never);
    /// assert_eq!(Expiration::from_minutes(5), Expiration::default());
    /// ```
    pub fn from_minutes(minutes: i64) -> Self {
        match u64::try_from(minutes) {
            Ok(minutes) => Self::minutes(minutes),
            Err(_) => Expiration::Never,
        }
    }

    /// Whether entries never expire.
    pub fn is_never(&self) -> bool {
        matches!(self, Expiration::Never)
    }

    /// Absolute deadline for an entry stored at `now`.
    ///
    /// Spans too large to represent are treated as never expiring.
    pub fn deadline_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Expiration::After(span) => chrono::Duration::from_std(*span)
                .ok()
                .and_then(|span| now.checked_add_signed(span)),
            Expiration::Never => None,
        }
    }
}

/// What happened at an interception site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interception {
    /// A cached result was returned; the body did not run.
    Hit,
    /// The body ran and its result was stored.
    Miss,
    /// The body ran and its result was not stored (null or unserializable).
    Skipped,
}

/// Wraps calls with read-through caching over a shared storage adapter.
///
/// # Examples
///
/// ```
/// use memora_cache::*;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), CacheError> {
/// let interceptor = CacheInterceptor::new(Arc::new(InMemoryCache::new()));
/// let descriptor = MethodDescriptor::new("pricing", "quote").with_param_of::<u32>("sku");
/// let arguments = InvocationArguments::new().with(&7u32);
///
/// let price: u64 = interceptor
///     .memoize(&descriptor, &arguments, || async { Ok::<_, CacheError>(1299) })
///     .await?;
/// assert_eq!(price, 1299);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheInterceptor {
    adapter: Arc<dyn StorageAdapter>,
    expiration: Expiration,
}

impl CacheInterceptor {
    /// Create an interceptor with the default expiration.
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            expiration: Expiration::default(),
        }
    }

    /// Copy of this interceptor using a different expiration.
    pub fn with_expiration(&self, expiration: Expiration) -> Self {
        Self {
            adapter: self.adapter.clone(),
            expiration,
        }
    }

    /// Configured expiration.
    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Shared storage adapter.
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Run `body` unless a result for this call is cached.
    ///
    /// Backend failures are converted into `E`; errors from `body` are
    /// returned unchanged and never stored.
    pub async fn memoize<T, E, F, Fut>(
        &self,
        descriptor: &MethodDescriptor,
        arguments: &InvocationArguments,
        body: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = KeyBuilder::build(descriptor, arguments);
        helpers::memoize(self.adapter.as_ref(), key.as_str(), self.expiration, body).await
    }

    /// Like [`memoize`](Self::memoize), also reporting what happened.
    pub async fn memoize_traced<T, E, F, Fut>(
        &self,
        descriptor: &MethodDescriptor,
        arguments: &InvocationArguments,
        body: F,
    ) -> Result<(T, Interception), E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = KeyBuilder::build(descriptor, arguments);
        helpers::memoize_traced(self.adapter.as_ref(), key.as_str(), self.expiration, body).await
    }

    /// Memoize under an explicit key.
    pub async fn memoize_key<T, E, F, Fut>(&self, key: &CacheKey, body: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        helpers::memoize(self.adapter.as_ref(), key.as_str(), self.expiration, body).await
    }
}

impl std::fmt::Debug for CacheInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInterceptor")
            .field("backend", &self.adapter.backend())
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Types that carry the interceptor used by their `#[cached]` methods.
pub trait CacheAware {
    /// Interceptor for this instance's memoized methods.
    fn interceptor(&self) -> &CacheInterceptor;
}

/// Look up `key` and refresh its expiry on a hit.
pub(crate) async fn on_entry<S, T>(
    adapter: &S,
    key: &str,
    expiration: Expiration,
) -> Result<Option<T>, CacheError>
where
    S: StorageAdapter + ?Sized,
    T: DeserializeOwned,
{
    let Some(payload) = adapter.get_json(key).await? else {
        debug!(target: "memora::cache", key = %key, "cache miss");
        return Ok(None);
    };

    match serde_json::from_str::<T>(&payload) {
        Ok(value) => {
            adapter
                .set_json(key, payload, expiration.deadline_from(Utc::now()))
                .await?;
            debug!(target: "memora::cache", key = %key, "cache hit");
            Ok(Some(value))
        }
        Err(e) => {
            warn!(
                target: "memora::cache",
                key = %key,
                error = %e,
                "cached payload does not decode, treating as miss"
            );
            Ok(None)
        }
    }
}

/// Store a freshly computed result unless it serializes to `null`.
pub(crate) async fn on_exit<S, T>(
    adapter: &S,
    key: &str,
    value: &T,
    expiration: Expiration,
) -> Result<Interception, CacheError>
where
    S: StorageAdapter + ?Sized,
    T: Serialize + ?Sized,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) if payload == "null" => {
            debug!(target: "memora::cache", key = %key, "null result not cached");
            return Ok(Interception::Skipped);
        }
        Ok(payload) => payload,
        Err(e) => {
            warn!(target: "memora::cache", key = %key, error = %e, "result not serializable, not cached");
            return Ok(Interception::Skipped);
        }
    };

    adapter
        .set_json(key, payload, expiration.deadline_from(Utc::now()))
        .await?;
    debug!(target: "memora::cache", key = %key, "result stored");
    Ok(Interception::Miss)
}
