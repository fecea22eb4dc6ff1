//! Cache Store Module
//!
//! Two-tier store: a remote backend as primary, an in-process expiring map
//! as fallback and mirror. No operation on a well-formed call returns an
//! error; backend and codec failures are logged, counted and degraded.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::backend::{RemoteBackend, SetEx};
use crate::cache::codec::PayloadCodec;
use crate::cache::fallback::FallbackStore;
use crate::cache::stats::{CacheMetrics, CacheStats};
use crate::cache::upstash::UpstashBackend;
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Default TTL in seconds when neither the caller nor the config sets one.
pub const DEFAULT_TTL_SECONDS: u64 = 300;

// == Health ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    /// Remote primary connected
    Healthy,
    /// Serving from the fallback only
    Degraded,
}

/// One entry for [`TieredCacheStore::mset`].
#[derive(Debug, Clone)]
pub struct MsetEntry<T> {
    pub key: String,
    pub value: T,
    /// `None` uses the store default
    pub ttl_seconds: Option<u64>,
}

impl<T> MsetEntry<T> {
    pub fn new(key: impl Into<String>, value: T, ttl_seconds: Option<u64>) -> Self {
        Self {
            key: key.into(),
            value,
            ttl_seconds,
        }
    }
}

// == Tiered Cache Store ==
/// Remote primary plus in-process fallback.
///
/// The fallback is a cache of last-known-good values: it sees every write
/// that passes through this store and nothing else. When the remote tier
/// recovers it repopulates through normal traffic; there is no
/// reconciliation between tiers.
pub struct TieredCacheStore {
    remote: Option<Arc<dyn RemoteBackend>>,
    fallback: FallbackStore,
    codec: PayloadCodec,
    metrics: CacheMetrics,
    default_ttl: u64,
}

impl TieredCacheStore {
    // == Constructors ==
    /// Fallback-only store.
    pub fn local(default_ttl: u64, codec: PayloadCodec) -> Self {
        Self {
            remote: None,
            fallback: FallbackStore::new(),
            codec,
            metrics: CacheMetrics::new(),
            default_ttl: effective_default(default_ttl),
        }
    }

    /// Store with an already-verified remote primary.
    pub fn with_remote(
        remote: Arc<dyn RemoteBackend>,
        default_ttl: u64,
        codec: PayloadCodec,
    ) -> Self {
        Self {
            remote: Some(remote),
            ..Self::local(default_ttl, codec)
        }
    }

    /// Probes `remote` once; keeps it only if it answers.
    pub async fn connect(
        remote: Arc<dyn RemoteBackend>,
        default_ttl: u64,
        codec: PayloadCodec,
    ) -> Self {
        match remote.ping().await {
            Ok(()) => {
                info!("Remote cache backend connected");
                Self::with_remote(remote, default_ttl, codec)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to remote cache, using fallback memory cache");
                Self::local(default_ttl, codec)
            }
        }
    }

    /// Builds the store described by `config`. Missing credentials mean
    /// fallback-only, which is a valid configuration.
    pub async fn from_config(config: &Config) -> Self {
        let codec = PayloadCodec::new(config.compression_threshold);
        let Some((url, token)) = config.remote_credentials() else {
            warn!("Remote cache credentials not found, using fallback memory cache");
            return Self::local(config.default_ttl, codec);
        };

        let timeout = Duration::from_millis(config.backend_timeout_ms);
        match UpstashBackend::new(url, token, timeout) {
            Ok(backend) => Self::connect(Arc::new(backend), config.default_ttl, codec).await,
            Err(e) => {
                warn!(error = %e, "Remote cache client could not be built, using fallback memory cache");
                Self::local(config.default_ttl, codec)
            }
        }
    }

    /// A store over the same remote tier with its own fallback and metrics.
    pub fn fork(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            ..Self::local(self.default_ttl, self.codec)
        }
    }

    fn ttl_or_default(&self, ttl_seconds: Option<u64>) -> u64 {
        match ttl_seconds {
            Some(ttl) if ttl > 0 => ttl,
            _ => self.default_ttl,
        }
    }

    fn record_failure(&self, op: &str, key: &str, err: &CacheError) {
        self.metrics.record_error();
        warn!(op = %op, key = %key, error = %err, "cache operation failed");
    }

    // == Get ==
    /// Returns the cached value, or `None` on a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                self.record_failure("get", key, &e);
                None
            }
        }
    }

    /// Like [`get`](Self::get) but reports decoding failures instead of
    /// treating them as a miss. Remote failures still fall through to the
    /// fallback.
    pub async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.metrics.record_request();

        let payload = match self.read_payload(key).await {
            Some(payload) => payload,
            None => {
                self.metrics.record_miss();
                return Ok(None);
            }
        };

        let value = self.codec.decode(&payload)?;
        self.metrics.record_hit();
        Ok(Some(value))
    }

    async fn read_payload(&self, key: &str) -> Option<String> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(Some(payload)) => {
                    debug!(key = %key, "cache hit (remote)");
                    return Some(payload);
                }
                Ok(None) => {}
                Err(e) => self.record_failure("get", key, &e),
            }
        }

        let payload = self.fallback.get(key);
        if payload.is_some() {
            debug!(key = %key, "cache hit (fallback)");
        }
        payload
    }

    // == Set ==
    /// Writes to the remote tier (best effort) and the fallback.
    ///
    /// `None` or `Some(0)` uses the default TTL. Returns `false` only when
    /// the value cannot be serialized.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> bool {
        match self.try_set(key, value, ttl_seconds).await {
            Ok(()) => true,
            Err(e) => {
                self.record_failure("set", key, &e);
                false
            }
        }
    }

    /// Like [`set`](Self::set) but reports serialization failures.
    pub async fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let ttl = self.ttl_or_default(ttl_seconds);
        let payload = self.codec.encode(value)?;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set_ex(key, &payload, ttl).await {
                self.record_failure("set", key, &e);
            }
        }

        self.fallback.set(key, payload, ttl);
        debug!(key = %key, ttl, "cache set");
        Ok(())
    }

    // == Delete ==
    /// Removes the key from both tiers. Returns whether either tier held it.
    pub async fn del(&self, key: &str) -> bool {
        let mut removed = false;
        if let Some(remote) = &self.remote {
            match remote.del(key).await {
                Ok(count) => removed = count > 0,
                Err(e) => self.record_failure("del", key, &e),
            }
        }
        self.fallback.remove(key) || removed
    }

    // == Exists ==
    pub async fn exists(&self, key: &str) -> bool {
        if let Some(remote) = &self.remote {
            match remote.exists(key).await {
                Ok(found) => return found,
                Err(e) => self.record_failure("exists", key, &e),
            }
        }
        self.fallback.contains(key)
    }

    // == Expire ==
    /// Resets the TTL in both tiers. Returns whether either tier held the key.
    pub async fn expire(&self, key: &str, ttl_seconds: u64) -> bool {
        let mut updated = false;
        if let Some(remote) = &self.remote {
            match remote.expire(key, ttl_seconds).await {
                Ok(found) => updated = found,
                Err(e) => self.record_failure("expire", key, &e),
            }
        }
        self.fallback.expire(key, ttl_seconds) || updated
    }

    // == Multi Get ==
    /// Values aligned with `keys`, `None` for each miss.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        if keys.is_empty() {
            return Vec::new();
        }

        if let Some(remote) = &self.remote {
            match remote.mget(keys).await {
                Ok(payloads) => {
                    let mut out = Vec::with_capacity(keys.len());
                    for (key, payload) in keys.iter().zip(payloads) {
                        self.metrics.record_request();
                        let payload = payload.or_else(|| self.fallback.get(key));
                        out.push(self.decode_counted(key, payload));
                    }
                    return out;
                }
                Err(e) => {
                    self.metrics.record_error();
                    warn!(keys = keys.len(), error = %e, "batched get failed, reading keys one by one");
                }
            }
        }

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await);
        }
        out
    }

    fn decode_counted<T: DeserializeOwned>(&self, key: &str, payload: Option<String>) -> Option<T> {
        let Some(payload) = payload else {
            self.metrics.record_miss();
            return None;
        };
        match self.codec.decode(&payload) {
            Ok(value) => {
                self.metrics.record_hit();
                Some(value)
            }
            Err(e) => {
                self.record_failure("mget", key, &e);
                None
            }
        }
    }

    // == Multi Set ==
    /// Writes every entry. Returns `false` without writing anything when any
    /// value fails to serialize.
    pub async fn mset<T: Serialize>(&self, entries: &[MsetEntry<T>]) -> bool {
        let mut batch = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.codec.encode(&entry.value) {
                Ok(value) => batch.push(SetEx {
                    key: entry.key.clone(),
                    value,
                    ttl_seconds: self.ttl_or_default(entry.ttl_seconds),
                }),
                Err(e) => {
                    self.record_failure("mset", &entry.key, &e);
                    return false;
                }
            }
        }

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set_ex_batch(&batch).await {
                self.metrics.record_error();
                warn!(keys = batch.len(), error = %e, "batched set failed on remote tier");
            }
        }

        for item in batch {
            self.fallback.set(&item.key, item.value, item.ttl_seconds);
        }
        true
    }

    // == Flush ==
    /// Clears every key in both tiers. Returns `false` if the remote flush failed.
    pub async fn flush(&self) -> bool {
        let mut ok = true;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.flush_all().await {
                self.record_failure("flush", "*", &e);
                ok = false;
            }
        }
        self.fallback.clear();
        info!("Cache flushed");
        ok
    }

    // == Health ==
    /// The fallback is always available, so the store is always usable.
    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn primary_connected(&self) -> bool {
        self.remote.is_some()
    }

    pub fn health(&self) -> StoreHealth {
        if self.primary_connected() {
            StoreHealth::Healthy
        } else {
            StoreHealth::Degraded
        }
    }

    // == Maintenance ==
    pub fn metrics(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }

    /// Sweeps expired fallback entries.
    pub fn purge_expired(&self) -> usize {
        self.fallback.purge_expired()
    }

    /// Drops the fallback contents and resets metrics.
    pub fn cleanup(&self) {
        self.fallback.clear();
        self.metrics.reset();
    }
}

fn effective_default(default_ttl: u64) -> u64 {
    if default_ttl == 0 {
        DEFAULT_TTL_SECONDS
    } else {
        default_ttl
    }
}

impl std::fmt::Debug for TieredCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCacheStore")
            .field("primary_connected", &self.primary_connected())
            .field("fallback_entries", &self.fallback.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{FailingBackend, MemoryBackend};
    use serde_json::{json, Value};
    use std::thread::sleep;

    fn local_store() -> TieredCacheStore {
        TieredCacheStore::local(300, PayloadCodec::default())
    }

    fn remote_store(backend: Arc<MemoryBackend>) -> TieredCacheStore {
        TieredCacheStore::with_remote(backend, 300, PayloadCodec::default())
    }

    fn failing_store() -> TieredCacheStore {
        TieredCacheStore::with_remote(Arc::new(FailingBackend), 300, PayloadCodec::default())
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = local_store();

        assert!(store.set("key1", &json!({"price": 10}), Some(60)).await);
        let value: Option<Value> = store.get("key1").await;

        assert_eq!(value, Some(json!({"price": 10})));
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = local_store();
        let value: Option<Value> = store.get("nonexistent").await;
        assert!(value.is_none());

        let stats = store.metrics();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 1);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = local_store();
        store.set("key1", "value1", Some(1)).await;
        assert_eq!(store.get::<String>("key1").await.as_deref(), Some("value1"));

        sleep(Duration::from_millis(1100));

        assert!(store.get::<String>("key1").await.is_none());
        assert_eq!(store.fallback_len(), 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_uses_default() {
        let store = local_store();
        store.set("key1", &1u32, Some(0)).await;
        assert!(store.exists("key1").await);
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = local_store();
        store.set("key1", "value1", None).await;

        assert!(store.del("key1").await);
        assert!(!store.del("key1").await);
        assert!(store.get::<String>("key1").await.is_none());
    }

    #[tokio::test]
    async fn test_store_overwrite() {
        let store = local_store();
        store.set("key1", "value1", None).await;
        store.set("key1", "value2", None).await;

        assert_eq!(store.get::<String>("key1").await.as_deref(), Some("value2"));
    }

    #[tokio::test]
    async fn test_remote_read_first() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert("k", "\"from-remote\"");
        let store = remote_store(backend);

        assert_eq!(store.get::<String>("k").await.as_deref(), Some("from-remote"));
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers() {
        let backend = Arc::new(MemoryBackend::default());
        let store = remote_store(backend.clone());

        store.set("k", &42u64, Some(30)).await;

        assert_eq!(backend.raw("k").as_deref(), Some("42"));
        assert_eq!(backend.ttl_of("k"), Some(30));
        assert_eq!(store.fallback_len(), 1);
    }

    #[tokio::test]
    async fn test_remote_miss_falls_back() {
        let backend = Arc::new(MemoryBackend::default());
        let store = remote_store(backend.clone());
        store.set("k", &7u64, None).await;
        backend.clear();

        assert_eq!(store.get::<u64>("k").await, Some(7));
    }

    #[tokio::test]
    async fn test_failing_remote_degrades_to_fallback() {
        let store = failing_store();

        assert!(store.set("k", "v", None).await);
        assert_eq!(store.get::<String>("k").await.as_deref(), Some("v"));
        assert!(store.exists("k").await);
        assert!(store.expire("k", 60).await);
        assert!(store.del("k").await);
        assert!(store.get::<String>("k").await.is_none());
        assert!(store.is_healthy());

        assert!(store.metrics().errors > 0);
    }

    #[tokio::test]
    async fn test_decode_failure_counts_error() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert("k", "{not json");
        let store = remote_store(backend);

        assert!(store.get::<Value>("k").await.is_none());
        let stats = store.metrics();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_try_get_reports_type_mismatch() {
        let store = local_store();
        store.set("k", "text", None).await;
        assert!(matches!(
            store.try_get::<u64>("k").await,
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_mget_preserves_order() {
        let store = local_store();
        store.set("a", "A", None).await;
        store.set("c", "C", None).await;

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values: Vec<Option<String>> = store.mget(&keys).await;

        assert_eq!(
            values,
            vec![Some("A".to_string()), None, Some("C".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mget_remote_batches_and_fills_from_fallback() {
        let backend = Arc::new(MemoryBackend::default());
        let store = remote_store(backend.clone());
        store.set("a", "A", None).await;
        store.set("c", "C", None).await;
        backend.remove("c");

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values: Vec<Option<String>> = store.mget(&keys).await;

        assert_eq!(
            values,
            vec![Some("A".to_string()), None, Some("C".to_string())]
        );
        assert_eq!(backend.mget_calls(), 1);
        assert_eq!(backend.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_mget_failing_remote_uses_fallback() {
        let store = failing_store();
        store.set("a", &1u64, None).await;

        let keys = vec!["a".to_string(), "missing".to_string()];
        let values: Vec<Option<u64>> = store.mget(&keys).await;
        assert_eq!(values, vec![Some(1), None]);
    }

    #[tokio::test]
    async fn test_mset_writes_everything() {
        let backend = Arc::new(MemoryBackend::default());
        let store = remote_store(backend.clone());

        let entries = vec![
            MsetEntry::new("x", 1u64, Some(10)),
            MsetEntry::new("y", 2u64, None),
        ];
        assert!(store.mset(&entries).await);

        assert_eq!(backend.batch_calls(), 1);
        assert_eq!(backend.ttl_of("x"), Some(10));
        assert_eq!(backend.ttl_of("y"), Some(300));
        assert_eq!(store.fallback_len(), 2);
    }

    #[tokio::test]
    async fn test_flush_clears_both_tiers() {
        let backend = Arc::new(MemoryBackend::default());
        let store = remote_store(backend.clone());
        store.set("a", "A", None).await;

        assert!(store.flush().await);
        assert!(backend.raw("a").is_none());
        assert_eq!(store.fallback_len(), 0);
    }

    #[tokio::test]
    async fn test_large_values_are_compressed_on_the_wire() {
        let backend = Arc::new(MemoryBackend::default());
        let store = TieredCacheStore::with_remote(backend.clone(), 300, PayloadCodec::new(16));
        let big = "y".repeat(2048);

        store.set("big", &big, None).await;

        let raw = backend.raw("big").unwrap();
        assert!(raw.starts_with(crate::cache::codec::COMPRESSED_PREFIX));
        assert!(raw.len() < big.len());
        assert_eq!(store.get::<String>("big").await, Some(big));
    }

    #[tokio::test]
    async fn test_connect_falls_back_when_ping_fails() {
        let store =
            TieredCacheStore::connect(Arc::new(FailingBackend), 300, PayloadCodec::default()).await;
        assert!(!store.primary_connected());
        assert_eq!(store.health(), StoreHealth::Degraded);
        assert!(store.is_healthy());
    }

    #[tokio::test]
    async fn test_from_config_without_credentials_is_local() {
        let store = TieredCacheStore::from_config(&Config::default()).await;
        assert!(!store.primary_connected());
    }

    #[tokio::test]
    async fn test_cleanup_resets_metrics_and_fallback() {
        let store = local_store();
        store.set("a", "A", None).await;
        let _ = store.get::<String>("a").await;

        store.cleanup();

        assert_eq!(store.metrics(), CacheStats::default());
        assert_eq!(store.fallback_len(), 0);
    }

    #[tokio::test]
    async fn test_fork_shares_remote_only() {
        let backend = Arc::new(MemoryBackend::default());
        let store = remote_store(backend.clone());
        let forked = store.fork();

        forked.set("shared", "S", None).await;
        assert_eq!(store.get::<String>("shared").await, Some("S".to_string()));
        assert_eq!(forked.metrics().total_requests, 0);
        assert_eq!(store.fallback_len(), 0);
        assert!(forked.primary_connected());
    }
}
