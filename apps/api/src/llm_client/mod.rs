/// LLM Client: the single point of entry for all text-generation calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All text-model interactions MUST go through this module.
///
/// Calls are at-most-once. A 429 is surfaced as `LlmError::RateLimited` so callers
/// can tell it apart from other upstream failures.
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// The model used for all rating calls.
pub const MODEL: &str = "gemini-1.5-flash-latest";
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited by the text model API")]
    RateLimited,

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Sampling settings sent as `generationConfig`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(rename = "response_mime_type")]
    pub response_mime_type: String,
}

impl GenerationConfig {
    /// Near-deterministic JSON output, used for scoring.
    pub fn scoring() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.2,
            top_k: 1,
            response_mime_type: "application/json".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: CandidateContent,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    pub text: Option<String>,
}

impl LlmResponse {
    /// Extracts the text of the first part of the first candidate.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// The single text-model client used by the rating engine.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url,
            generation_config: GenerationConfig::scoring(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            MODEL
        )
    }

    /// Makes a single call to the model, returning the full response object.
    pub async fn call(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let request_body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: &self.generation_config,
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", &self.api_key)])
            .json(&request_body)
            .send()
            .await
            // the request URL carries the API key
            .map_err(|e| LlmError::Http(e.without_url()))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            warn!("Text model API rate limited the request: {}", body);
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.without_url()))?;
        let llm_response: LlmResponse = serde_json::from_str(&body)?;
        debug!(
            "LLM call succeeded: {} candidate(s)",
            llm_response.candidates.len()
        );

        Ok(llm_response)
    }

    /// Calls the model and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, LlmError> {
        let response = self.call(prompt).await?;

        let text = response.text().ok_or(LlmError::EmptyContent)?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_json_fences(text);

        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn gemini_body(inner: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": inner }] } }]
        })
        .to_string()
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_generation_config_wire_names() {
        let value = serde_json::to_value(GenerationConfig::scoring()).unwrap();
        assert!(value.get("topP").is_some());
        assert!(value.get("top_p").is_none());
        assert_eq!(value["topK"], 1);
        assert_eq!(value["response_mime_type"], "application/json");
    }

    #[tokio::test]
    async fn test_call_json_parses_inner_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash-latest:generateContent",
            )
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{ "parts": [{ "text": "rate this" }] }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(gemini_body("{\"answer\": 42}"))
            .create_async()
            .await;

        let client = LlmClient::with_base_url("test-key".to_string(), server.url());
        let value: serde_json::Value = client.call_json("rate this").await.unwrap();
        assert_eq!(value["answer"], 42);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client = LlmClient::with_base_url("k".to_string(), server.url());
        let result = client.call("hi").await;
        assert!(matches!(result, Err(LlmError::RateLimited)));
    }

    #[tokio::test]
    async fn test_other_status_is_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = LlmClient::with_base_url("k".to_string(), server.url());
        match client.call("hi").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_response_body_is_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = LlmClient::with_base_url("k".to_string(), server.url());
        let result = client.call("hi").await;
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_content() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{\"candidates\": []}")
            .create_async()
            .await;

        let client = LlmClient::with_base_url("k".to_string(), server.url());
        let result: Result<serde_json::Value, _> = client.call_json("hi").await;
        assert!(matches!(result, Err(LlmError::EmptyContent)));
    }
}
