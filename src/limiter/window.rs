//! Fixed-window rate limiter.
//!
//! Each identity gets one counter per window, keyed by the window start.
//! Crossing a boundary derives a fresh key, so counters reset implicitly and
//! expire through their own TTL.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::cache::{current_timestamp_ms, KeyCodec, TieredCacheStore};
use crate::error::Result;
use crate::limiter::policy::{FailurePolicy, RateLimitPolicy};
use crate::sync::KeyedLocks;

// == Counter Store ==
/// Where window counters live.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count, `None` for an unseen window.
    async fn load_count(&self, key: &str) -> Result<Option<u64>>;

    async fn store_count(&self, key: &str, count: u64, ttl_seconds: u64) -> Result<()>;
}

#[async_trait]
impl CounterStore for TieredCacheStore {
    async fn load_count(&self, key: &str) -> Result<Option<u64>> {
        self.try_get::<u64>(key).await
    }

    async fn store_count(&self, key: &str, count: u64, ttl_seconds: u64) -> Result<()> {
        self.try_set(key, &count, Some(ttl_seconds)).await
    }
}

// == Decision ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    /// Epoch milliseconds at which the current window ends
    pub reset_time_ms: u64,
    pub limit: u64,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, as sent in `Retry-After`.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_time_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

// == Rate Limiter ==
pub struct RateLimiter {
    policy: RateLimitPolicy,
    failure_policy: FailurePolicy,
    store: Arc<dyn CounterStore>,
    keys: KeyCodec,
    locks: KeyedLocks,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, store: Arc<dyn CounterStore>, keys: KeyCodec) -> Self {
        Self {
            policy,
            failure_policy: FailurePolicy::default(),
            store,
            keys,
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Counts one request from `identity` against the current window.
    pub async fn is_allowed(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, current_timestamp_ms()).await
    }

    /// [`is_allowed`](Self::is_allowed) with an explicit clock reading.
    pub async fn check_at(&self, identity: &str, now_ms: u64) -> RateLimitDecision {
        let max = self.policy.max_requests;
        let window_start = self.policy.window_start(now_ms);
        let reset_time_ms = window_start + self.policy.window_ms;
        let key = self.keys.rate_limit_key(identity, window_start);

        // Serialize read-then-write for this window within the process.
        let _guard = self.locks.lock(&key).await;

        match self.count_request(&key, max).await {
            Ok(Some(count)) => RateLimitDecision {
                allowed: true,
                remaining: max.saturating_sub(count),
                reset_time_ms,
                limit: max,
            },
            Ok(None) => {
                warn!(identity = %identity, max_requests = max, "Rate limit exceeded");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_time_ms,
                    limit: max,
                }
            }
            Err(e) => {
                warn!(
                    identity = %identity,
                    error = %e,
                    policy = %self.failure_policy,
                    "Rate limiter store error"
                );
                match self.failure_policy {
                    FailurePolicy::FailOpen => RateLimitDecision {
                        allowed: true,
                        remaining: max.saturating_sub(1),
                        reset_time_ms,
                        limit: max,
                    },
                    FailurePolicy::FailClosed => RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_time_ms,
                        limit: max,
                    },
                }
            }
        }
    }

    /// Returns the new count, or `None` when the window is exhausted.
    async fn count_request(&self, key: &str, max: u64) -> Result<Option<u64>> {
        let current = self.store.load_count(key).await?.unwrap_or(0);
        if current >= max {
            return Ok(None);
        }
        let next = current + 1;
        self.store
            .store_count(key, next, self.policy.window_ttl_seconds())
            .await?;
        Ok(Some(next))
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{PayloadCodec, TieredCacheStore};
    use crate::error::CacheError;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn load_count(&self, _key: &str) -> Result<Option<u64>> {
            Err(CacheError::BackendUnavailable("down".into()))
        }

        async fn store_count(&self, _key: &str, _count: u64, _ttl: u64) -> Result<()> {
            Err(CacheError::BackendUnavailable("down".into()))
        }
    }

    fn limiter(policy: RateLimitPolicy) -> RateLimiter {
        let store = Arc::new(TieredCacheStore::local(300, PayloadCodec::default()));
        RateLimiter::new(policy, store, KeyCodec::new("gti"))
    }

    #[tokio::test]
    async fn test_fourth_request_in_window_is_rejected() {
        let limiter = limiter(RateLimitPolicy::new(1000, 3));
        let base = 1_700_000_000_000;

        let mut allowed = Vec::new();
        for i in 0..4 {
            allowed.push(limiter.check_at("client", base + i * 10).await.allowed);
        }
        assert_eq!(allowed, vec![true, true, true, false]);
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let limiter = limiter(RateLimitPolicy::new(1000, 3));
        let base = 1_700_000_000_000;

        let remaining: Vec<u64> = [
            limiter.check_at("c", base).await.remaining,
            limiter.check_at("c", base).await.remaining,
            limiter.check_at("c", base).await.remaining,
            limiter.check_at("c", base).await.remaining,
        ]
        .to_vec();
        assert_eq!(remaining, vec![2, 1, 0, 0]);
    }

    #[tokio::test]
    async fn test_window_rollover_resets() {
        let limiter = limiter(RateLimitPolicy::new(1000, 3));
        let base = 1_700_000_000_000;
        for _ in 0..4 {
            limiter.check_at("client", base).await;
        }

        let next = limiter.check_at("client", base + 1000).await;
        assert!(next.allowed);
        assert_eq!(next.remaining, 2);
        assert_eq!(next.reset_time_ms, base + 2000);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = limiter(RateLimitPolicy::new(1000, 1));
        let now = 5_000;
        assert!(limiter.check_at("a", now).await.allowed);
        assert!(!limiter.check_at("a", now).await.allowed);
        assert!(limiter.check_at("b", now).await.allowed);
    }

    #[tokio::test]
    async fn test_pricing_policy_rejects_31st_request() {
        let limiter = limiter(RateLimitPolicy::pricing());
        let window_start = 1_700_000_040_000; // multiple of 60_000
        assert_eq!(window_start % 60_000, 0);

        for i in 0..30 {
            let decision = limiter.check_at("1.2.3.4", window_start + 500 + i * 1000).await;
            assert!(decision.allowed, "request {} should pass", i + 1);
        }

        let rejected = limiter.check_at("1.2.3.4", window_start + 59_000).await;
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_time_ms, window_start + 60_000);
    }

    #[tokio::test]
    async fn test_fail_open_on_store_error() {
        let limiter = RateLimiter::new(
            RateLimitPolicy::new(1000, 3),
            Arc::new(BrokenStore),
            KeyCodec::new("gti"),
        );

        for _ in 0..10 {
            let decision = limiter.is_allowed("client").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 2);
        }
    }

    #[tokio::test]
    async fn test_fail_closed_on_store_error() {
        let limiter = RateLimiter::new(
            RateLimitPolicy::new(1000, 3),
            Arc::new(BrokenStore),
            KeyCodec::new("gti"),
        )
        .with_failure_policy(FailurePolicy::FailClosed);

        let decision = limiter.is_allowed("client").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_over_admit() {
        let limiter = Arc::new(limiter(RateLimitPolicy::new(60_000, 5)));
        let now = 120_000;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check_at("burst", now).await.allowed
            }));
        }

        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let decision = RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_time_ms: 10_500,
            limit: 1,
        };
        assert_eq!(decision.retry_after_secs(9_000), 2);
        assert_eq!(decision.retry_after_secs(11_000), 0);
    }
}
