//! Per-route limiter selection.

use std::sync::Arc;

use crate::cache::KeyCodec;
use crate::limiter::policy::{FailurePolicy, RateLimitPolicy};
use crate::limiter::window::{CounterStore, RateLimiter};

/// The three preset limiters sharing one counter store.
#[derive(Debug)]
pub struct LimiterSet {
    api: RateLimiter,
    pricing: RateLimiter,
    auth: RateLimiter,
}

impl LimiterSet {
    /// Builds the api, pricing and auth limiters over `store`.
    ///
    /// # Arguments
    /// * `store` - Where window counters are kept
    /// * `keys` - Codec that namespaces the counter keys
    /// * `failure_policy` - Answer given when `store` fails
    pub fn new(
        store: Arc<dyn CounterStore>,
        keys: KeyCodec,
        failure_policy: FailurePolicy,
    ) -> Self {
        let build = |policy: RateLimitPolicy, domain: &str| {
            let keys = KeyCodec::new(format!("{}:{}", keys.namespace(), domain));
            RateLimiter::new(policy, store.clone(), keys).with_failure_policy(failure_policy)
        };

        Self {
            api: build(RateLimitPolicy::api(), "api"),
            pricing: build(RateLimitPolicy::pricing(), "pricing"),
            auth: build(RateLimitPolicy::auth(), "auth"),
        }
    }

    /// Limiter for a request path: `/pricing/` first, then `/auth/`, else api.
    pub fn select(&self, path: &str) -> &RateLimiter {
        if path.contains("/pricing/") {
            &self.pricing
        } else if path.contains("/auth/") {
            &self.auth
        } else {
            &self.api
        }
    }

    pub fn api(&self) -> &RateLimiter {
        &self.api
    }

    pub fn pricing(&self) -> &RateLimiter {
        &self.pricing
    }

    pub fn auth(&self) -> &RateLimiter {
        &self.auth
    }
}
