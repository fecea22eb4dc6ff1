//! In-memory and always-failing remote backends for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::backend::{RemoteBackend, SetEx};
use crate::error::{CacheError, Result};

/// Remote backend backed by a map. Records TTLs but never expires.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, (String, u64)>>,
    get_calls: AtomicUsize,
    mget_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn insert(&self, key: &str, payload: &str) {
        self.data
            .lock()
            .insert(key.to_string(), (payload.to_string(), 0));
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.data.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn remove(&self, key: &str) {
        self.data.lock().remove(key);
    }

    pub fn clear(&self) {
        self.data.lock().clear();
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn mget_calls(&self) -> usize {
        self.mget_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.data
            .lock()
            .insert(key.to_string(), (value.to_string(), ttl_seconds));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<u64> {
        Ok(self.data.lock().remove(key).map_or(0, |_| 1))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().contains_key(key))
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        Ok(match self.data.lock().get_mut(key) {
            Some(entry) => {
                entry.1 = ttl_seconds;
                true
            }
            None => false,
        })
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.mget_calls.fetch_add(1, Ordering::SeqCst);
        Ok(keys.iter().map(|k| self.raw(k)).collect())
    }

    async fn set_ex_batch(&self, entries: &[SetEx]) -> Result<()> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock();
        for e in entries {
            data.insert(e.key.clone(), (e.value.clone(), e.ttl_seconds));
        }
        Ok(())
    }

    async fn flush_all(&self) -> Result<()> {
        self.clear();
        Ok(())
    }
}

/// Remote backend whose every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingBackend;

fn unavailable<T>() -> Result<T> {
    Err(CacheError::BackendUnavailable("connection refused".to_string()))
}

#[async_trait]
impl RemoteBackend for FailingBackend {
    async fn ping(&self) -> Result<()> {
        unavailable()
    }

    async fn get(&self, _key: &str) -> Result<Option<String>> {
        unavailable()
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<()> {
        unavailable()
    }

    async fn del(&self, _key: &str) -> Result<u64> {
        unavailable()
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        unavailable()
    }

    async fn expire(&self, _key: &str, _ttl_seconds: u64) -> Result<bool> {
        unavailable()
    }

    async fn mget(&self, _keys: &[String]) -> Result<Vec<Option<String>>> {
        unavailable()
    }

    async fn set_ex_batch(&self, _entries: &[SetEx]) -> Result<()> {
        unavailable()
    }

    async fn flush_all(&self) -> Result<()> {
        unavailable()
    }
}
