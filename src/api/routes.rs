//! API Route Configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::{limit::ConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{logging_middleware, rate_limit_middleware};

/// Requests served at once; the rest wait
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .route("/analyze/token", post(handlers::analyze_token));

    Router::new()
        .nest("/v1", api_v1)
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors)
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
        // Bottom layer runs first
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(rate_limit_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EvidenceExtractor, SecurityAnalyzer};
    use crate::models::config::GuardConfig;
    use crate::providers::{ChainRegistry, ExplorerClient};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn router() -> Router {
        let config = GuardConfig::default();
        let analyzer = SecurityAnalyzer::with_parts(
            &config,
            Arc::new(ChainRegistry::with_clients(Vec::new())),
            Arc::new(ExplorerClient::empty(Duration::from_secs(1)).unwrap()),
            EvidenceExtractor::default(),
        );
        create_router(Arc::new(AppState::new(analyzer)))
    }

    fn analyze(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/analyze/token")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unsupported_chain_maps_to_422() {
        let response = router()
            .oneshot(analyze(
                r#"{"token_address":"0xdAC17F958D2ee523a2206206994597C13D831ec7","chain":"tron"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_invalid_address_maps_to_400() {
        let response = router()
            .oneshot(analyze(r#"{"address":"0x12","chain":"eth"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
