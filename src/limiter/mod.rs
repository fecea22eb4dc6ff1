//! Rate Limiting Module
//!
//! Fixed-window request counting per client identity, backed by the cache
//! store, with a configurable answer for store failures.

mod identity;
mod policy;
mod set;
mod window;

pub use identity::{client_identity, UNKNOWN_CLIENT};
pub use policy::{FailurePolicy, RateLimitPolicy};
pub use set::LimiterSet;
pub use window::{CounterStore, RateLimitDecision, RateLimiter};
