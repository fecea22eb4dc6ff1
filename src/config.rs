//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::limiter::FailurePolicy;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application namespace prepended to every cache key
    pub namespace: String,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Fallback sweep interval in seconds
    pub cleanup_interval: u64,
    /// Encoded payloads above this many bytes are compressed
    pub compression_threshold: usize,
    /// Per-request timeout for the remote backend, in milliseconds
    pub backend_timeout_ms: u64,
    /// Remote backend REST endpoint
    pub remote_url: Option<String>,
    /// Remote backend bearer token
    pub remote_token: Option<String>,
    /// What the rate limiter does when its counter store fails
    pub rate_limit_failure_policy: FailurePolicy,
    /// Queries slower than this are recorded as slow, in milliseconds
    pub slow_query_threshold_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Key namespace (default: gti)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Fallback sweep frequency in seconds (default: 300)
    /// - `COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 1024)
    /// - `BACKEND_TIMEOUT_MS` - Remote call timeout (default: 2000)
    /// - `KV_REST_API_URL` / `KV_REST_API_TOKEN` - Remote backend credentials
    /// - `RATE_LIMIT_FAILURE_POLICY` - `open` or `closed` (default: open)
    /// - `SLOW_QUERY_THRESHOLD_MS` - Slow query threshold (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            compression_threshold: parse_var("COMPRESSION_THRESHOLD")
                .unwrap_or(defaults.compression_threshold),
            backend_timeout_ms: parse_var("BACKEND_TIMEOUT_MS")
                .unwrap_or(defaults.backend_timeout_ms),
            remote_url: non_empty_var("KV_REST_API_URL"),
            remote_token: non_empty_var("KV_REST_API_TOKEN"),
            rate_limit_failure_policy: parse_var("RATE_LIMIT_FAILURE_POLICY")
                .unwrap_or(defaults.rate_limit_failure_policy),
            slow_query_threshold_ms: parse_var("SLOW_QUERY_THRESHOLD_MS")
                .unwrap_or(defaults.slow_query_threshold_ms),
        }
    }

    /// Returns the remote credentials when both halves are present.
    pub fn remote_credentials(&self) -> Option<(&str, &str)> {
        match (&self.remote_url, &self.remote_token) {
            (Some(url), Some(token)) => Some((url.as_str(), token.as_str())),
            _ => None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "gti".to_string(),
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 300,
            compression_threshold: 1024,
            backend_timeout_ms: 2000,
            remote_url: None,
            remote_token: None,
            rate_limit_failure_policy: FailurePolicy::FailOpen,
            slow_query_threshold_ms: 1000,
        }
    }
}
