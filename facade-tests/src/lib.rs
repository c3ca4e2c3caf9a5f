// Inventory lookups memoized through the `memora` facade only

use memora::{CacheAware, CacheError, CacheInterceptor, InMemoryCache, cached};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Inventory {
    cache: CacheInterceptor,
    lookups: AtomicUsize,
}

impl CacheAware for Inventory {
    fn interceptor(&self) -> &CacheInterceptor {
        &self.cache
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            cache: CacheInterceptor::new(Arc::new(InMemoryCache::new())),
            lookups: AtomicUsize::new(0),
        }
    }
}

impl Inventory {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    #[cached(minutes = 1)]
    pub async fn stock(&self, sku: u32) -> Result<u32, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(sku * 10)
    }

    #[cached(using = warehouse(), declaring = Self, never_expire)]
    pub async fn location(sku: u32) -> Result<String, CacheError> {
        Ok(format!("aisle-{}", sku % 7))
    }
}

fn warehouse() -> &'static CacheInterceptor {
    static WAREHOUSE: std::sync::OnceLock<CacheInterceptor> = std::sync::OnceLock::new();
    WAREHOUSE.get_or_init(|| CacheInterceptor::new(Arc::new(InMemoryCache::new())))
}
