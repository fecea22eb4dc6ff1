//! Fallback Store Module
//!
//! In-process expiring map that mirrors every write and answers reads when
//! the remote tier has nothing.

use dashmap::DashMap;

use crate::cache::entry::{current_timestamp_ms, CacheEntry};

#[derive(Debug, Default)]
pub struct FallbackStore {
    entries: DashMap<String, CacheEntry>,
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live payload, evicting the entry if it is past its deadline.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = current_timestamp_ms();
        // remove_if holds the shard lock, so a concurrent refresh is not lost
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: &str, value: String, ttl_seconds: u64) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl_seconds));
    }

    /// Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = current_timestamp_ms();
        matches!(self.entries.remove(key), Some((_, entry)) if !entry.is_expired_at(now))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Moves a live entry's deadline. Returns false if there is no live entry.
    pub fn expire(&self, key: &str, ttl_seconds: u64) -> bool {
        if !self.contains(key) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expire_in(ttl_seconds);
                true
            }
            None => false,
        }
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_set_and_get() {
        let store = FallbackStore::new();
        store.set("k", "1".to_string(), 60);
        assert_eq!(store.get("k").as_deref(), Some("1"));
    }

    #[test]
    fn test_lazy_expiry_evicts() {
        let store = FallbackStore::new();
        store.set("k", "1".to_string(), 1);
        sleep(Duration::from_millis(1100));

        assert_eq!(store.len(), 1);
        assert!(store.get("k").is_none());
        assert_eq!(store.len(), 0, "stale entry should be evicted on read");
    }

    #[test]
    fn test_remove_reports_live_entries_only() {
        let store = FallbackStore::new();
        store.set("k", "1".to_string(), 60);
        assert!(store.remove("k"));
        assert!(!store.remove("k"));
    }

    #[test]
    fn test_expire_missing_key() {
        let store = FallbackStore::new();
        assert!(!store.expire("missing", 10));
    }

    #[test]
    fn test_purge_expired() {
        let store = FallbackStore::new();
        store.set("short", "1".to_string(), 1);
        store.set("long", "2".to_string(), 60);
        sleep(Duration::from_millis(1100));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("long"));
    }
}
