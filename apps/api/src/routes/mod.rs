pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::rate_limit::rate_limit;
use crate::rating::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Rating API, limited per client
    let ratings = Router::new()
        .route("/api/v1/ratings", post(handlers::handle_rate))
        .route("/getsteamrating", post(handlers::handle_rate))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(ratings)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::llm_client::LlmClient;
    use crate::middleware::rate_limit::build_limiter;
    use crate::rating::captioner::ImageCaptioner;
    use crate::rating::fetcher::PageFetcher;
    use crate::rating::pipeline::RatingPipeline;
    use crate::rating::sink::TracingSink;
    use crate::rating::text_scoring::TextScorer;
    use crate::vision_client::VisionClient;

    fn test_state(limit: Option<u32>) -> AppState {
        let pipeline = RatingPipeline::new(
            PageFetcher::new(),
            ImageCaptioner::new(VisionClient::new("acct", "k".to_string())),
            TextScorer::new(LlmClient::new("k".to_string())),
            Arc::new(TracingSink),
            Duration::from_secs(1),
        );
        AppState {
            pipeline,
            limiter: limit.map(build_limiter),
        }
    }

    fn rating_request(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "storefront-rater");
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(rating_request("/api/v1/ratings", "url="))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_foreign_host_is_bad_request_on_legacy_route() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(rating_request(
                "/getsteamrating",
                "url=https%3A%2F%2Fexample.com%2Fapp%2F1%2Fgame%2F",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_limiter_blocks_after_quota() {
        let app = build_router(test_state(Some(1)));

        let first = app
            .clone()
            .oneshot(rating_request("/api/v1/ratings", "url="))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);

        let second = app
            .clone()
            .oneshot(rating_request("/api/v1/ratings", "url="))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = json_body(second).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");

        // health is never limited
        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
