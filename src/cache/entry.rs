//! Cache Entry Module
//!
//! Defines the structure for fallback entries with TTL support.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A single fallback entry: the encoded payload and its absolute deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The encoded payload
    pub value: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl_seconds` from now.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: deadline_after(now, ttl_seconds),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its deadline.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Refresh Deadline ==
    /// Moves the deadline to `ttl_seconds` from now.
    pub fn expire_in(&mut self, ttl_seconds: u64) {
        self.expires_at = deadline_after(current_timestamp_ms(), ttl_seconds);
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

fn deadline_after(now_ms: u64, ttl_seconds: u64) -> u64 {
    now_ms.saturating_add(ttl_seconds.saturating_mul(1000))
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
