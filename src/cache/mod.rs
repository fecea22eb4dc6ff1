//! Cache Module
//!
//! Two-tier caching with TTL expiration, key namespacing, metrics and a
//! cache-aside orchestrator.

mod aside;
mod backend;
mod codec;
mod entry;
mod fallback;
mod key;
mod stats;
mod store;
mod upstash;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public types
pub use aside::{AsideStats, CacheAside, QueryOptions};
pub use backend::{RemoteBackend, SetEx};
pub use codec::{PayloadCodec, COMPRESSED_PREFIX};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use fallback::FallbackStore;
pub use key::{build_key, canonical_json, sorted_ids, KeyCodec, KeyPart, KEY_DELIMITER};
pub use stats::{CacheMetrics, CacheStats};
pub use store::{MsetEntry, StoreHealth, TieredCacheStore, DEFAULT_TTL_SECONDS};
pub use upstash::UpstashBackend;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
