//! Rate-limit middleware
//!
//! Counts every request against the limiter picked by its path and stamps
//! the `X-RateLimit-*` headers on the response.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::handlers::AppState;
use crate::cache::current_timestamp_ms;
use crate::error::CacheError;
use crate::limiter::{client_identity, RateLimitDecision};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rejects the request with 429 once the client's window is used up.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let identity = client_identity(req.headers());
    let limiter = state.limiters.select(req.uri().path());
    let decision = limiter.is_allowed(&identity).await;

    if !decision.allowed {
        debug!(identity = %identity, path = %req.uri().path(), "Request rate limited");
        let mut res = CacheError::RateLimited.into_response();
        let retry_after = decision.retry_after_secs(current_timestamp_ms());
        let headers = res.headers_mut();
        write_limit_headers(headers, &decision);
        headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
        return res;
    }

    let mut res = next.run(req).await;
    write_limit_headers(res.headers_mut(), &decision);
    res
}

fn write_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let pairs = [
        (LIMIT_HEADER, decision.limit),
        (REMAINING_HEADER, decision.remaining),
        (RESET_HEADER, decision.reset_time_ms),
    ];
    for (name, value) in pairs {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
}
