//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, StoreHealth};

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// TTL applied, in seconds
    pub ttl: u64,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, ttl: u64) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            ttl,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
    /// Whether any tier held the key
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        let key = key.into();
        let message = if deleted {
            format!("Key '{}' deleted successfully", key)
        } else {
            format!("Key '{}' was not present", key)
        };
        Self {
            message,
            key,
            deleted,
        }
    }
}

/// Response body for GET /exists/:key
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for PUT /expire/:key
#[derive(Debug, Clone, Serialize)]
pub struct ExpireResponse {
    pub key: String,
    pub ttl: u64,
    /// False when no tier held the key
    pub updated: bool,
}

/// Response body for POST /mget; `values` follows the request key order.
#[derive(Debug, Clone, Serialize)]
pub struct MgetResponse {
    pub values: Vec<Option<Value>>,
}

/// Response body for POST /mset and DELETE /flush
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub count: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total_requests: u64,
    /// Hit rate (hits / total_requests)
    pub hit_rate: f64,
    /// Entries held by the in-process fallback
    pub fallback_entries: usize,
    pub primary_connected: bool,
}

impl StatsResponse {
    pub fn new(stats: CacheStats, fallback_entries: usize, primary_connected: bool) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            errors: stats.errors,
            total_requests: stats.total_requests,
            hit_rate: stats.hit_rate(),
            fallback_entries,
            primary_connected,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: StoreHealth,
    pub primary_connected: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(status: StoreHealth, primary_connected: bool) -> Self {
        Self {
            status,
            primary_connected,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
