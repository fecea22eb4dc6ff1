//! Cache-Aside Orchestrator
//!
//! Read-through/write-through wrapper around an arbitrary fetch function.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::cache::store::TieredCacheStore;
use crate::error::{CacheError, Result};
use crate::sync::KeyedLocks;

// == Query Options ==
/// Per-call caching policy for [`CacheAside::with_cache`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Read the cache before fetching
    pub use_cache: bool,
    /// TTL for the written value, `None` for the store default
    pub ttl_seconds: Option<u64>,
    /// Skip the read and always fetch
    pub force_refresh: bool,
    /// Write the fetched value back to the cache
    pub write_back: bool,
    /// Upper bound on the fetch itself
    pub timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            ttl_seconds: None,
            force_refresh: false,
            write_back: true,
            timeout: None,
        }
    }
}

impl QueryOptions {
    pub fn ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds: Some(ttl_seconds),
            ..Self::default()
        }
    }

    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn reads_cache(&self) -> bool {
        self.use_cache && !self.force_refresh
    }
}

// == Aside Stats ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AsideStats {
    pub lookups: u64,
    pub hits: u64,
    pub fetches: u64,
    pub fetch_errors: u64,
}

#[derive(Debug, Default)]
struct AsideCounters {
    lookups: AtomicU64,
    hits: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
}

// == Cache Aside ==
/// Cache-aside over a [`TieredCacheStore`].
///
/// Concurrent misses on one key are collapsed: the first caller fetches
/// while the rest wait on the key lock and then read what it wrote.
#[derive(Debug)]
pub struct CacheAside {
    store: Arc<TieredCacheStore>,
    in_flight: KeyedLocks,
    counters: AsideCounters,
}

impl CacheAside {
    pub fn new(store: Arc<TieredCacheStore>) -> Self {
        Self {
            store,
            in_flight: KeyedLocks::new(),
            counters: AsideCounters::default(),
        }
    }

    pub fn store(&self) -> &Arc<TieredCacheStore> {
        &self.store
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its result.
    ///
    /// Fetch errors are returned as [`CacheError::Fetch`] and nothing is
    /// cached. Cache failures never surface here.
    pub async fn with_cache<T, F, Fut>(&self, key: &str, options: QueryOptions, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        if !options.reads_cache() {
            return self.fetch_and_store(key, &options, fetch).await;
        }

        self.counters.lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(value) = self.store.get::<T>(key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache-aside hit");
            return Ok(value);
        }

        let _guard = self.in_flight.lock(key).await;

        // Another caller may have filled the key while we waited.
        if let Some(value) = self.store.get::<T>(key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache-aside hit after wait");
            return Ok(value);
        }

        self.fetch_and_store(key, &options, fetch).await
    }

    async fn fetch_and_store<T, F, Fut>(&self, key: &str, options: &QueryOptions, fetch: F) -> Result<T>
    where
        T: Serialize + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let outcome = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch()).await {
                Ok(result) => result.map_err(CacheError::Fetch),
                Err(_) => Err(CacheError::FetchTimeout(limit.as_millis() as u64)),
            },
            None => fetch().await.map_err(CacheError::Fetch),
        };

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                self.counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if options.write_back {
            self.store.set(key, &value, options.ttl_seconds).await;
            debug!(key = %key, "cache-aside set");
        }
        Ok(value)
    }

    /// Drops a cached value so the next read fetches.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.store.del(key).await
    }

    pub fn stats(&self) -> AsideStats {
        AsideStats {
            lookups: self.counters.lookups.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            fetch_errors: self.counters.fetch_errors.load(Ordering::Relaxed),
        }
    }
}
