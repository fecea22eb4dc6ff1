//! GTI Cache - tiered caching, rate limiting and query tracking
//!
//! A remote-primary cache with an in-process fallback, a cache-aside
//! orchestrator with single-flight fetches, fixed-window rate limiting and
//! a query performance tracker, plus a small HTTP server over all of it.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod models;
pub mod perf;
pub mod sync;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheAside, KeyCodec, QueryOptions, TieredCacheStore};
pub use config::Config;
pub use error::{CacheError, Result};
pub use limiter::{FailurePolicy, LimiterSet, RateLimitPolicy, RateLimiter};
pub use perf::QueryPerformanceTracker;
pub use tasks::spawn_cleanup_task;
