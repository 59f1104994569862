//! Vision Client: image-to-text calls against the Workers AI llava model.
//!
//! Like `llm_client`, this is the only module allowed to talk to the vision API.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const CLOUDFLARE_ACCOUNTS_BASE: &str = "https://api.cloudflare.com/client/v4/accounts";
const VISION_MODEL_PATH: &str = "ai/run/@cf/llava-hf/llava-1.5-7b-hf";
/// Caption length cap sent with every request.
pub const MAX_CAPTION_TOKENS: u32 = 256;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by the vision API")]
    RateLimited,

    #[error("Vision API reported failure: {0}")]
    Unsuccessful(String),
}

#[derive(Debug, Serialize)]
struct ImageToTextRequest<'a> {
    /// Raw image bytes, serialized as an array of integers.
    image: &'a [u8],
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ImageToTextResponse {
    result: Option<CaptionResult>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CaptionResult {
    #[serde(default)]
    description: String,
}

#[derive(Clone)]
pub struct VisionClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl VisionClient {
    pub fn new(account_id: &str, api_key: String) -> Self {
        Self::with_base_url(CLOUDFLARE_ACCOUNTS_BASE, account_id, api_key)
    }

    pub fn with_base_url(base_url: &str, account_id: &str, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            endpoint: format!(
                "{}/{}/{}",
                base_url.trim_end_matches('/'),
                account_id,
                VISION_MODEL_PATH
            ),
        }
    }

    /// Asks the model to describe `image` following `prompt`. Single attempt.
    pub async fn describe(&self, image: &[u8], prompt: &str) -> Result<String, VisionError> {
        let body = ImageToTextRequest {
            image,
            prompt,
            max_tokens: MAX_CAPTION_TOKENS,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            warn!("Vision API rate limited the request: {}", body);
            return Err(VisionError::RateLimited);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ImageToTextResponse = response.json().await?;
        if !parsed.success {
            return Err(VisionError::Unsuccessful(format!("{:?}", parsed.errors)));
        }

        let caption = parsed
            .result
            .map(|r| r.description.trim().to_string())
            .unwrap_or_default();
        debug!("Vision caption received ({} chars)", caption.len());

        Ok(caption)
    }
}
