//! Query Performance Tracker
//!
//! Bounded duration history, slow-query ring buffer and a derived health score.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::perf::analyzer::{analyze_query, normalize_pattern};

/// Durations kept for the running average.
pub const MAX_DURATION_HISTORY: usize = 1000;
/// Slow queries kept for reporting.
pub const MAX_SLOW_QUERIES: usize = 100;
pub const DEFAULT_SLOW_QUERY_THRESHOLD_MS: u64 = 1000;

const STORED_QUERY_CHARS: usize = 200;
const LOGGED_QUERY_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowQueryRecord {
    /// First 200 characters of the query
    pub query: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub query_count: u64,
    pub average_response_time_ms: f64,
    pub slow_queries: Vec<SlowQueryRecord>,
    pub cache_hit_rate: f64,
    pub recommendations: Vec<String>,
    /// Optimization hints from recorded slow queries, deduplicated.
    pub suggestions: Vec<String>,
    pub health_score: u32,
}

#[derive(Debug, Default)]
struct TrackerState {
    query_count: u64,
    durations: VecDeque<u64>,
    duration_sum: u64,
    slow_queries: VecDeque<SlowQueryRecord>,
    /// Percentage, 0..=100
    cache_hit_rate: f64,
}

// == Query Performance Tracker ==
#[derive(Debug)]
pub struct QueryPerformanceTracker {
    slow_threshold_ms: u64,
    state: Mutex<TrackerState>,
}

impl Default for QueryPerformanceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_QUERY_THRESHOLD_MS)
    }
}

impl QueryPerformanceTracker {
    pub fn new(slow_threshold_ms: u64) -> Self {
        Self {
            slow_threshold_ms,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn slow_threshold_ms(&self) -> u64 {
        self.slow_threshold_ms
    }

    // == Record ==
    /// Records one execution. Durations above the threshold are kept as slow queries.
    pub fn record(&self, query: &str, duration_ms: u64) {
        self.record_at(query, duration_ms, Utc::now());
    }

    fn record_at(&self, query: &str, duration_ms: u64, at: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.query_count += 1;

        state.durations.push_back(duration_ms);
        state.duration_sum = state.duration_sum.saturating_add(duration_ms);
        if state.durations.len() > MAX_DURATION_HISTORY {
            if let Some(oldest) = state.durations.pop_front() {
                state.duration_sum = state.duration_sum.saturating_sub(oldest);
            }
        }

        if duration_ms > self.slow_threshold_ms {
            state.slow_queries.push_back(SlowQueryRecord {
                query: truncate(query, STORED_QUERY_CHARS),
                duration_ms,
                timestamp: at,
            });
            if state.slow_queries.len() > MAX_SLOW_QUERIES {
                state.slow_queries.pop_front();
            }
            drop(state);

            warn!(
                duration_ms,
                query = %truncate(query, LOGGED_QUERY_CHARS),
                "Slow query detected"
            );
        }
    }

    /// Runs `fut`, records how long it took under `query`, and returns its output.
    pub async fn time<F: Future>(&self, query: &str, fut: F) -> F::Output {
        let started = Instant::now();
        let output = fut.await;
        self.record(query, started.elapsed().as_millis() as u64);
        output
    }

    /// Sets the cache hit rate, as a percentage, used by the report.
    pub fn update_cache_hit_rate(&self, percent: f64) {
        self.state.lock().cache_hit_rate = percent;
    }

    pub fn average_response_time_ms(&self) -> f64 {
        average(&self.state.lock())
    }

    pub fn slow_query_count(&self) -> usize {
        self.state.lock().slow_queries.len()
    }

    // == Report ==
    pub fn report(&self) -> PerformanceReport {
        let state = self.state.lock();
        let average_response_time_ms = average(&state);
        let hour_ago = Utc::now() - Duration::hours(1);
        let recent_slow = state
            .slow_queries
            .iter()
            .filter(|q| q.timestamp > hour_ago)
            .count();

        let mut recommendations = Vec::new();
        let mut score: i32 = 100;

        if average_response_time_ms > 500.0 {
            recommendations
                .push("Average query response time is high. Consider query optimization.".to_string());
            score -= 20;
        }

        if recent_slow > 10 {
            recommendations
                .push("High number of slow queries detected. Review query patterns.".to_string());
            score -= 30;
        }

        if state.cache_hit_rate < 70.0 {
            recommendations.push(
                "Cache hit rate is low. Consider adjusting cache TTL or cache keys.".to_string(),
            );
            score -= 15;
        }

        PerformanceReport {
            query_count: state.query_count,
            average_response_time_ms,
            slow_queries: state.slow_queries.iter().cloned().collect(),
            cache_hit_rate: state.cache_hit_rate,
            recommendations,
            suggestions: report_suggestions(&state),
            health_score: score.max(0) as u32,
        }
    }

    // == Suggestions ==
    /// Hints from repeated slow-query shapes plus general advice.
    pub fn optimization_suggestions(&self) -> Vec<String> {
        general_suggestions(&self.state.lock())
    }

    pub fn reset(&self) {
        *self.state.lock() = TrackerState::default();
    }
}

fn general_suggestions(state: &TrackerState) -> Vec<String> {
    let mut suggestions: Vec<String> = repeated_patterns(&state.slow_queries)
        .into_iter()
        .map(|p| format!("Optimize queries matching pattern: {}", p))
        .collect();

    if average(state) > 200.0 {
        suggestions.push("Consider implementing database connection pooling".to_string());
        suggestions.push("Review and optimize database indexes".to_string());
        suggestions
            .push("Consider query result caching for frequently accessed data".to_string());
    }

    if state.cache_hit_rate < 80.0 {
        suggestions.push("Increase cache TTL for stable data".to_string());
        suggestions.push("Implement cache warming for critical queries".to_string());
        suggestions.push("Review cache key strategies for better hit rates".to_string());
    }

    suggestions
}

/// General suggestions followed by per-query hints for each distinct slow query.
fn report_suggestions(state: &TrackerState) -> Vec<String> {
    let mut suggestions = general_suggestions(state);
    let mut seen: HashSet<&str> = HashSet::new();
    for record in &state.slow_queries {
        if !seen.insert(record.query.as_str()) {
            continue;
        }
        for hint in analyze_query(&record.query).optimizations {
            if !suggestions.contains(&hint) {
                suggestions.push(hint);
            }
        }
    }
    suggestions
}

fn average(state: &TrackerState) -> f64 {
    if state.durations.is_empty() {
        0.0
    } else {
        state.duration_sum as f64 / state.durations.len() as f64
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Patterns seen more than once, most frequent first.
fn repeated_patterns(slow: &VecDeque<SlowQueryRecord>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in slow {
        *counts.entry(normalize_pattern(&record.query)).or_default() += 1;
    }

    let mut repeated: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    repeated.into_iter().map(|(p, _)| p).collect()
}
