//! Axum route handlers for the Rating API.

use axum::{extract::State, Form, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::rating::models::RatingResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    #[serde(default)]
    pub url: String,
}

/// POST /api/v1/ratings (legacy: POST /getsteamrating)
///
/// Form body `url=<store page url>`. Returns the full rating breakdown.
pub async fn handle_rate(
    State(state): State<AppState>,
    Form(request): Form<RatingRequest>,
) -> Result<Json<RatingResult>, AppError> {
    if request.url.trim().is_empty() {
        return Err(AppError::Validation("url is required".to_string()));
    }

    let result = state.pipeline.rate(&request.url).await?;

    Ok(Json(result))
}
