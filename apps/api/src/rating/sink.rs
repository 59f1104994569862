//! Rating sink: where finished ratings are handed off after the response is built.
//!
//! Carried in `AppState` as `Arc<dyn RatingSink>`. The shipped sink only logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::rating::fetcher::StoreUrl;
use crate::rating::models::RatingResult;

const DEFAULT_PROMPT_TYPE: &str = "default";

/// One completed rating, flattened for storage.
#[derive(Debug, Clone, Serialize)]
pub struct RatingRecord {
    pub id: Uuid,
    pub app_id: String,
    pub slug: String,
    pub url: String,
    pub prompt_type: String,
    pub score: u32,
    pub rating: serde_json::Value,
    pub prompt: String,
    pub rated_at: DateTime<Utc>,
}

impl RatingRecord {
    pub fn new(
        url: &StoreUrl,
        result: &RatingResult,
        prompt: String,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            app_id: url.app_id().to_string(),
            slug: url.slug().to_string(),
            url: url.as_str().to_string(),
            prompt_type: DEFAULT_PROMPT_TYPE.to_string(),
            score: result.final_weighted_score,
            rating: serde_json::to_value(result)?,
            prompt,
            rated_at: Utc::now(),
        })
    }
}

#[async_trait]
pub trait RatingSink: Send + Sync {
    async fn record(&self, record: RatingRecord) -> anyhow::Result<()>;
}

/// Logs every record at info level.
pub struct TracingSink;

#[async_trait]
impl RatingSink for TracingSink {
    async fn record(&self, record: RatingRecord) -> anyhow::Result<()> {
        info!(
            id = %record.id,
            app_id = %record.app_id,
            slug = %record.slug,
            score = record.score,
            prompt_chars = record.prompt.len(),
            rated_at = %record.rated_at,
            "Rating recorded"
        );
        Ok(())
    }
}
