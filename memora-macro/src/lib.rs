// Procedural macros for Memora
// `#[cached]` routes an async method through a CacheInterceptor

use proc_macro::TokenStream;

mod cache_attr;

/// Memoize an async function's result.
///
/// Supported forms: `#[cached]`, `#[cached(minutes = 10)]`,
/// `#[cached(seconds = 30)]`, `#[cached(never_expire)]` (or `minutes = -1`),
/// and `#[cached(using = <expr>)]` to name the interceptor explicitly.
/// Methods taking `self` default to `CacheAware::interceptor(self)`.
/// Associated functions without `self` add `declaring = Self` so the key
/// names their type rather than the enclosing module.
#[proc_macro_attribute]
pub fn cached(attr: TokenStream, item: TokenStream) -> TokenStream {
    cache_attr::cached_impl(attr, item)
}
