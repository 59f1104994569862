use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::rating::error::RatingError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<RatingError> for AppError {
    fn from(e: RatingError) -> Self {
        match e {
            RatingError::InvalidUrl(_) => AppError::Validation(e.to_string()),
            RatingError::Extraction { .. } | RatingError::AgeGate(_) | RatingError::ScoreParse(_) => {
                AppError::UnprocessableEntity(e.to_string())
            }
            RatingError::RateLimited(_) => AppError::UpstreamRateLimited(e.to_string()),
            RatingError::Fetch(_) | RatingError::Api(_) => AppError::Upstream(e.to_string()),
            RatingError::Timeout { .. } => AppError::Timeout(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Daily rating limit reached, try again later".to_string(),
            ),
            AppError::UpstreamRateLimited(msg) => {
                tracing::error!("Upstream rate limited: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UPSTREAM_RATE_LIMITED",
                    "A rating service is busy, try again shortly".to_string(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "An upstream service failed".to_string(),
                )
            }
            AppError::Timeout(msg) => {
                tracing::error!("Timeout: {msg}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    "Rating took too long".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
