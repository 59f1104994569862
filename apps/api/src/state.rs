use std::sync::Arc;

use crate::middleware::rate_limit::ClientLimiter;
use crate::rating::pipeline::RatingPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: RatingPipeline,
    /// Per-client limiter for the rating routes. `None` in DEV.
    pub limiter: Option<Arc<ClientLimiter>>,
}
