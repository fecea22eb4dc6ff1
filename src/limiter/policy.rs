//! Rate-limit policies and the backend failure policy.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// == Failure Policy ==
/// What the limiter answers when its counter store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Let the request through
    #[default]
    FailOpen,
    /// Reject the request
    FailClosed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail-open" | "fail_open" => Ok(FailurePolicy::FailOpen),
            "closed" | "fail-closed" | "fail_closed" => Ok(FailurePolicy::FailClosed),
            other => Err(format!("unknown failure policy: {}", other)),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailOpen => f.write_str("open"),
            FailurePolicy::FailClosed => f.write_str("closed"),
        }
    }
}

// == Rate Limit Policy ==
/// `max_requests` per fixed window of `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitPolicy {
    pub window_ms: u64,
    pub max_requests: u64,
}

impl RateLimitPolicy {
    pub const fn new(window_ms: u64, max_requests: u64) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// General API traffic: 100 requests per 15 minutes.
    pub const fn api() -> Self {
        Self::new(15 * 60 * 1000, 100)
    }

    /// Pricing calculations: 30 requests per minute.
    pub const fn pricing() -> Self {
        Self::new(60 * 1000, 30)
    }

    /// Authentication attempts: 5 per 15 minutes.
    pub const fn auth() -> Self {
        Self::new(15 * 60 * 1000, 5)
    }

    /// Start of the window containing `now_ms`.
    pub fn window_start(&self, now_ms: u64) -> u64 {
        let window = self.window_ms.max(1);
        now_ms / window * window
    }

    /// Counter TTL: the window length rounded up to whole seconds.
    pub fn window_ttl_seconds(&self) -> u64 {
        self.window_ms.div_ceil(1000).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(RateLimitPolicy::api(), RateLimitPolicy::new(900_000, 100));
        assert_eq!(RateLimitPolicy::pricing(), RateLimitPolicy::new(60_000, 30));
        assert_eq!(RateLimitPolicy::auth(), RateLimitPolicy::new(900_000, 5));
    }

    #[test]
    fn test_window_start_floors() {
        let policy = RateLimitPolicy::new(1000, 3);
        assert_eq!(policy.window_start(0), 0);
        assert_eq!(policy.window_start(999), 0);
        assert_eq!(policy.window_start(1000), 1000);
        assert_eq!(policy.window_start(12_345), 12_000);
    }

    #[test]
    fn test_window_ttl_rounds_up() {
        assert_eq!(RateLimitPolicy::new(1500, 1).window_ttl_seconds(), 2);
        assert_eq!(RateLimitPolicy::new(60_000, 1).window_ttl_seconds(), 60);
        assert_eq!(RateLimitPolicy::new(10, 1).window_ttl_seconds(), 1);
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("open".parse::<FailurePolicy>(), Ok(FailurePolicy::FailOpen));
        assert_eq!(
            "Fail-Closed".parse::<FailurePolicy>(),
            Ok(FailurePolicy::FailClosed)
        );
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }
}
