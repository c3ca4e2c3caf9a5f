// Memora - method-level memoization for async Rust
//
// Results of expensive calls are stored under a key derived from the method
// identity and its arguments, in a backend chosen by configuration.

// Lets `#[cached]` expansions refer to `::memora` from inside this crate
extern crate self as memora;

// Re-export core functionality
pub use memora_cache::*;

// Re-export procedural macros
pub use memora_macro::cached;

// Re-export the cache crate itself for fully qualified paths
pub use memora_cache;

pub mod telemetry;

pub mod prelude {
    pub use crate::cached;
    pub use crate::telemetry;
    pub use memora_cache::prelude::*;
}
