//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, errors and total requests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Metrics ==
/// Live, shareable counters. Monotonic until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    total_requests: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.total_requests.store(0, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
        }
    }
}

// == Cache Stats ==
/// Snapshot of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from either tier
    pub hits: u64,
    /// Reads answered by neither tier
    pub misses: u64,
    /// Swallowed backend or serialization failures
    pub errors: u64,
    /// Read attempts
    pub total_requests: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / total_requests, or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }

    /// Hit rate as a percentage rounded to two decimals.
    pub fn hit_rate_percent(&self) -> f64 {
        (self.hit_rate() * 10_000.0).round() / 100.0
    }
}
