//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Every handler
//! times its own work with the query tracker.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{KeyCodec, MsetEntry, TieredCacheStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::limiter::LimiterSet;
use crate::models::{
    validate_key, BatchResponse, DeleteResponse, ExistsResponse, ExpireRequest, ExpireResponse,
    GetResponse, HealthResponse, MgetRequest, MgetResponse, MsetRequest, SetRequest, SetResponse,
    StatsResponse,
};
use crate::perf::{PerformanceReport, QueryPerformanceTracker};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TieredCacheStore>,
    pub tracker: Arc<QueryPerformanceTracker>,
    pub limiters: Arc<LimiterSet>,
}

impl AppState {
    /// Wires the tracker and limiters around an existing store.
    ///
    /// Rate-limit counters go through a fork of `store`, so they share its
    /// remote tier but never show up in its metrics.
    pub fn new(store: Arc<TieredCacheStore>, config: &Config) -> Self {
        let counters = Arc::new(store.fork());
        let limiters = LimiterSet::new(
            counters,
            KeyCodec::new(config.namespace.clone()),
            config.rate_limit_failure_policy,
        );

        Self {
            store,
            tracker: Arc::new(QueryPerformanceTracker::new(config.slow_query_threshold_ms)),
            limiters: Arc::new(limiters),
        }
    }

    /// Creates a new AppState from configuration, connecting the remote
    /// tier when credentials are present.
    pub async fn from_config(config: &Config) -> Self {
        let store = TieredCacheStore::from_config(config).await;
        Self::new(Arc::new(store), config)
    }
}

fn check_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(msg) => Err(CacheError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let stored = state
        .tracker
        .time("PUT /set", state.store.set(&req.key, &req.value, req.ttl))
        .await;
    if !stored {
        return Err(CacheError::Internal(format!("could not store '{}'", req.key)));
    }

    let ttl = match req.ttl {
        Some(ttl) if ttl > 0 => ttl,
        _ => state.store.default_ttl(),
    };
    Ok(Json(SetResponse::new(req.key, ttl)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    check_key(&key)?;

    let value = state
        .tracker
        .time("GET /get", state.store.get::<Value>(&key))
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    check_key(&key)?;

    let deleted = state.tracker.time("DELETE /del", state.store.del(&key)).await;
    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for GET /exists/:key
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>> {
    check_key(&key)?;

    let exists = state.tracker.time("GET /exists", state.store.exists(&key)).await;
    Ok(Json(ExistsResponse { key, exists }))
}

/// Handler for PUT /expire/:key
pub async fn expire_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<ExpireRequest>,
) -> Result<Json<ExpireResponse>> {
    check_key(&key)?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let updated = state
        .tracker
        .time("PUT /expire", state.store.expire(&key, req.ttl))
        .await;
    Ok(Json(ExpireResponse {
        key,
        ttl: req.ttl,
        updated,
    }))
}

/// Handler for POST /mget
pub async fn mget_handler(
    State(state): State<AppState>,
    Json(req): Json<MgetRequest>,
) -> Result<Json<MgetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let values = state
        .tracker
        .time("POST /mget", state.store.mget::<Value>(&req.keys))
        .await;
    Ok(Json(MgetResponse { values }))
}

/// Handler for POST /mset
pub async fn mset_handler(
    State(state): State<AppState>,
    Json(req): Json<MsetRequest>,
) -> Result<Json<BatchResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entries: Vec<MsetEntry<Value>> = req
        .entries
        .into_iter()
        .map(|item| MsetEntry::new(item.key, item.value, item.ttl))
        .collect();

    let success = state.tracker.time("POST /mset", state.store.mset(&entries)).await;
    if !success {
        return Err(CacheError::Internal("batch could not be stored".to_string()));
    }

    Ok(Json(BatchResponse {
        success,
        count: entries.len(),
    }))
}

/// Handler for DELETE /flush
///
/// `count` is the number of live local entries cleared.
pub async fn flush_handler(State(state): State<AppState>) -> Json<BatchResponse> {
    state.store.purge_expired();
    let count = state.store.fallback_len();
    let success = state.tracker.time("DELETE /flush", state.store.flush()).await;
    Json(BatchResponse { success, count })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = &state.store;
    Json(StatsResponse::new(
        store.metrics(),
        store.fallback_len(),
        store.primary_connected(),
    ))
}

/// Handler for GET /performance
///
/// Feeds the current cache hit rate into the tracker before reporting.
pub async fn performance_handler(State(state): State<AppState>) -> Json<PerformanceReport> {
    state
        .tracker
        .update_cache_hit_rate(state.store.metrics().hit_rate_percent());
    Json(state.tracker.report())
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        state.store.health(),
        state.store.primary_connected(),
    ))
}
