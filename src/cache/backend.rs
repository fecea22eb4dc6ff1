//! Remote Backend Module
//!
//! The seam between the tiered store and a durable key/value service.

use async_trait::async_trait;

use crate::error::Result;

/// One `SETEX` in a pipelined batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEx {
    pub key: String,
    pub value: String,
    pub ttl_seconds: u64,
}

/// Commands the tiered store needs from its primary backend.
///
/// Values are the already-encoded payload strings. Implementations report
/// failures as errors; the store decides how to degrade.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Liveness probe used once at startup.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// Returns the number of keys removed.
    async fn del(&self, key: &str) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Returns whether the key existed and had its TTL updated.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool>;

    /// Results are positionally aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Writes every entry in one round trip.
    async fn set_ex_batch(&self, entries: &[SetEx]) -> Result<()>;

    async fn flush_all(&self) -> Result<()>;
}
