//! Query Performance Module
//!
//! Records query durations, flags slow queries, scores overall health and
//! produces heuristic optimization hints.

mod analyzer;
mod tracker;

pub use analyzer::{analyze_query, normalize_pattern, QueryPlan};
pub use tracker::{
    PerformanceReport, QueryPerformanceTracker, SlowQueryRecord, DEFAULT_SLOW_QUERY_THRESHOLD_MS,
    MAX_DURATION_HISTORY, MAX_SLOW_QUERIES,
};
