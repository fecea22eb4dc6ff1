//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};

/// Maximum number of keys accepted by one batch request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Checks one key, returning an error message if it is unusable.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

fn validate_value(value: &Value) -> Option<String> {
    if value.to_string().len() > MAX_VALUE_SIZE {
        return Some(format!("Value exceeds maximum size of {} bytes", MAX_VALUE_SIZE));
    }
    None
}

fn validate_batch<'a>(keys: impl ExactSizeIterator<Item = &'a str>) -> Option<String> {
    if keys.len() == 0 {
        return Some("Batch cannot be empty".to_string());
    }
    if keys.len() > MAX_BATCH_SIZE {
        return Some(format!("Batch exceeds maximum of {} keys", MAX_BATCH_SIZE));
    }
    keys.into_iter().find_map(validate_key)
}

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key).or_else(|| validate_value(&self.value))
    }
}

/// Request body for PUT /expire/:key
#[derive(Debug, Clone, Deserialize)]
pub struct ExpireRequest {
    /// New TTL in seconds
    pub ttl: u64,
}

impl ExpireRequest {
    pub fn validate(&self) -> Option<String> {
        if self.ttl == 0 {
            return Some("TTL must be greater than zero".to_string());
        }
        None
    }
}

/// Request body for POST /mget
#[derive(Debug, Clone, Deserialize)]
pub struct MgetRequest {
    pub keys: Vec<String>,
}

impl MgetRequest {
    pub fn validate(&self) -> Option<String> {
        validate_batch(self.keys.iter().map(String::as_str))
    }
}

/// One entry of an MSET request.
#[derive(Debug, Clone, Deserialize)]
pub struct MsetItem {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Request body for POST /mset
#[derive(Debug, Clone, Deserialize)]
pub struct MsetRequest {
    pub entries: Vec<MsetItem>,
}

impl MsetRequest {
    pub fn validate(&self) -> Option<String> {
        validate_batch(self.entries.iter().map(|e| e.key.as_str()))
            .or_else(|| self.entries.iter().find_map(|e| validate_value(&e.value)))
    }
}
