//! Response caching.
//!
//! - [`ResponseCache`] - exact and similarity-based lookup with adaptive
//!   ttl and scored eviction. See [`response`] module docs.
//! - [`CacheEntry`] - one cached response and its access bookkeeping.
//! - [`CacheStore`] - pluggable snapshot persistence (memory, file, redis).

pub mod entry;
pub mod response;
pub mod store;

pub use entry::{CacheEntry, EntryMetadata};
pub use response::{CacheConfig, CacheStats, ResponseCache, SimilarityConfig, TRUNCATION_MARKER};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{CacheSnapshot, CacheStore, FileStore, MemoryStore};
