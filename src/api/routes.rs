//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, exists_handler, expire_handler, flush_handler, get_handler, health_handler,
    mget_handler, mset_handler, performance_handler, set_handler, stats_handler, AppState,
};
use super::rate_limit::rate_limit_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - Rate limiting on every route except `/health`
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limited = Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/exists/:key", get(exists_handler))
        .route("/expire/:key", put(expire_handler))
        .route("/mget", post(mget_handler))
        .route("/mset", post(mset_handler))
        .route("/flush", delete(flush_handler))
        .route("/stats", get(stats_handler))
        .route("/performance", get(performance_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(limited)
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{PayloadCodec, TieredCacheStore};
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let store = TieredCacheStore::local(300, PayloadCodec::default());
        create_router(AppState::new(Arc::new(store), &Config::default()))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    #[tokio::test]
    async fn test_stats_endpoint_carries_limit_headers() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "99");
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"test","value":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
