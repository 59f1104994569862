use std::fmt;

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::rating::pipeline::RatingStage;
use crate::vision_client::VisionError;

/// A required part of the store page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSection {
    PrimarySection,
    Description,
    Tags,
    GenreBlock,
    Genres,
    CapsuleImage,
    HighlightImages,
    AboutSection,
}

impl fmt::Display for PageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageSection::PrimarySection => "primary section",
            PageSection::Description => "description",
            PageSection::Tags => "tags",
            PageSection::GenreBlock => "genre block",
            PageSection::Genres => "genres",
            PageSection::CapsuleImage => "capsule image",
            PageSection::HighlightImages => "highlight images",
            PageSection::AboutSection => "about section",
        };
        f.write_str(name)
    }
}

/// Terminal failures of a rating request.
#[derive(Debug, Error)]
pub enum RatingError {
    #[error("Invalid store page url: {0}")]
    InvalidUrl(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Required page section missing: {field}")]
    Extraction { field: PageSection },

    #[error("Age gate error: {0}")]
    AgeGate(String),

    #[error("Upstream model rate limited the request: {0}")]
    RateLimited(String),

    #[error("Upstream model API error: {0}")]
    Api(String),

    #[error("Could not parse model scores: {0}")]
    ScoreParse(String),

    #[error("Rating deadline exceeded during {stage}")]
    Timeout { stage: RatingStage },
}

impl RatingError {
    pub fn missing(field: PageSection) -> Self {
        RatingError::Extraction { field }
    }
}

impl From<reqwest::Error> for RatingError {
    fn from(e: reqwest::Error) -> Self {
        RatingError::Fetch(e.to_string())
    }
}

impl From<LlmError> for RatingError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RateLimited => RatingError::RateLimited("text model".to_string()),
            LlmError::Api { status, message } => {
                RatingError::Api(format!("text model status {status}: {message}"))
            }
            LlmError::Http(e) => RatingError::Api(format!("text model request failed: {e}")),
            LlmError::Parse(e) => RatingError::ScoreParse(e.to_string()),
            LlmError::EmptyContent => {
                RatingError::ScoreParse("model returned no candidates".to_string())
            }
        }
    }
}

/// Per-image captioning failure. Logged by the captioner, never returned to callers.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("vision model failed for {url}: {source}")]
    Vision {
        url: String,
        #[source]
        source: VisionError,
    },
}

impl CaptionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            CaptionError::Vision {
                source: VisionError::RateLimited,
                ..
            }
        )
    }
}
