//! Text Scorer: one rubric prompt, one model call, five component scores.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::llm_client::LlmClient;
use crate::rating::error::RatingError;
use crate::rating::models::ComponentScore;
use crate::rating::prompts::{fill_template, EXAMPLE_EVALUATION, RATING_PROMPT_TEMPLATE};

const MAX_RAW_SCORE: f64 = 5.0;

/// The five model-produced component scores on the 0–5 raw scale.
#[derive(Debug, Clone, PartialEq)]
pub struct TextScores {
    pub description: ComponentScore,
    pub about_game: ComponentScore,
    pub genres: ComponentScore,
    pub highlight_images: ComponentScore,
    pub capsule_image: ComponentScore,
}

/// Page text and captions the prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct TextContext<'a> {
    pub description: &'a str,
    pub about_text: &'a str,
    pub genres: &'a [String],
    pub highlight_captions: &'a [String],
    pub capsule_caption: &'a str,
}

// ────────────────────────────────────────────────────────────────────────────
// Model response shape
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelScores {
    description: ModelSection,
    about_this_game: ModelSection,
    genres: ModelSection,
    highlight_image_captions: ModelSection,
    capsule_image_caption: ModelSection,
}

#[derive(Debug, Deserialize)]
struct ModelSection {
    /// Usually a numeral string, occasionally a bare number.
    score: Value,
    #[serde(default)]
    actionablefeedback: String,
    #[serde(default)]
    strengths: String,
}

impl ModelSection {
    fn into_score(self, section: &str) -> Result<ComponentScore, RatingError> {
        let raw = match &self.score {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
        .filter(|v| v.is_finite() && (0.0..=MAX_RAW_SCORE).contains(v))
        .ok_or_else(|| {
            RatingError::ScoreParse(format!(
                "section '{section}' has invalid score {}",
                self.score
            ))
        })?;

        Ok(ComponentScore {
            raw,
            actionable_feedback: self.actionablefeedback.trim().to_string(),
            strengths: self.strengths.trim().to_string(),
        })
    }
}

impl TryFrom<ModelScores> for TextScores {
    type Error = RatingError;

    fn try_from(m: ModelScores) -> Result<Self, Self::Error> {
        Ok(Self {
            description: m.description.into_score("description")?,
            about_game: m.about_this_game.into_score("aboutThisGame")?,
            genres: m.genres.into_score("genres")?,
            highlight_images: m.highlight_image_captions.into_score("highlightImageCaptions")?,
            capsule_image: m.capsule_image_caption.into_score("capsuleImageCaption")?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scorer
// ────────────────────────────────────────────────────────────────────────────

/// Fills the rating template. Empty highlight captions are left out.
pub fn build_prompt(ctx: &TextContext<'_>) -> String {
    let genres = ctx.genres.join(", ");
    let highlight_captions = ctx
        .highlight_captions
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(",\n");

    fill_template(
        RATING_PROMPT_TEMPLATE,
        &[
            ("description", ctx.description),
            ("example", EXAMPLE_EVALUATION),
            ("about", ctx.about_text),
            ("genres", genres.as_str()),
            ("highlight_captions", highlight_captions.as_str()),
            ("capsule_caption", ctx.capsule_caption),
        ],
    )
}

#[derive(Clone)]
pub struct TextScorer {
    llm: LlmClient,
}

impl TextScorer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Returns the five scores together with the prompt that produced them.
    pub async fn score(&self, ctx: &TextContext<'_>) -> Result<(TextScores, String), RatingError> {
        let prompt = build_prompt(ctx);
        debug!("Rating prompt built ({} chars)", prompt.len());

        let model_scores: ModelScores = self.llm.call_json(&prompt).await?;
        let scores = TextScores::try_from(model_scores)?;
        info!("Text model scores received");

        Ok((scores, prompt))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    pub(crate) fn model_json(scores: [&str; 5]) -> String {
        let section = |s: &str| {
            serde_json::json!({
                "score": s,
                "actionablefeedback": format!("Improve this part, currently at {s}."),
                "strengths": "Clear and concise."
            })
        };
        serde_json::json!({
            "description": section(scores[0]),
            "aboutThisGame": section(scores[1]),
            "genres": section(scores[2]),
            "highlightImageCaptions": section(scores[3]),
            "capsuleImageCaption": section(scores[4]),
        })
        .to_string()
    }

    pub(crate) fn gemini_body(inner: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": inner }] } }]
        })
        .to_string()
    }

    fn parse(text: &str) -> Result<TextScores, RatingError> {
        let model: ModelScores = serde_json::from_str(text)
            .map_err(|e| RatingError::ScoreParse(e.to_string()))?;
        TextScores::try_from(model)
    }

    fn context<'a>(genres: &'a [String], captions: &'a [String]) -> TextContext<'a> {
        TextContext {
            description: "Slash your way through a cursed kingdom.",
            about_text: "Explore a ruined world and fight its fallen knights.",
            genres,
            highlight_captions: captions,
            capsule_caption: "The title Ashen Crown over a burning castle.",
        }
    }

    #[test]
    fn test_prompt_embeds_page_text_and_captions() {
        let genres = vec!["Action".to_string(), "RPG".to_string()];
        let captions = vec![
            "A knight fights a dragon.".to_string(),
            String::new(),
            "A village at dusk.".to_string(),
        ];
        let prompt = build_prompt(&context(&genres, &captions));

        assert!(prompt.contains("Slash your way through a cursed kingdom."));
        assert!(prompt.contains("Explore a ruined world"));
        assert!(prompt.contains("Genres: Action, RPG"));
        assert!(prompt.contains("A knight fights a dragon.,\nA village at dusk."));
        assert!(prompt.contains("The title Ashen Crown over a burning castle."));
        assert!(prompt.contains("Parse-O-Rhythm"));
        assert!(!prompt.contains("{genres}"));
        assert!(!prompt.contains("{highlight_captions}"));
    }

    #[test]
    fn test_prompt_tolerates_missing_captions() {
        let genres = vec!["Puzzle".to_string()];
        let ctx = TextContext {
            capsule_caption: "",
            ..context(&genres, &[])
        };
        let prompt = build_prompt(&ctx);
        assert!(prompt.contains("CapsuleImage context:\n\nChecklist:"));
    }

    #[test]
    fn test_placeholder_text_in_page_is_left_alone() {
        let genres = vec!["RPG".to_string()];
        let ctx = TextContext {
            description: "Type {genres} or {about} to win.",
            ..context(&genres, &[])
        };
        let prompt = build_prompt(&ctx);
        assert!(prompt.contains("Type {genres} or {about} to win."));
        assert!(prompt.contains("Genres: RPG"));
    }

    #[test]
    fn test_parse_all_sections() {
        let scores = parse(&model_json(["5", "3", "4", "2", "4"])).unwrap();
        assert_eq!(scores.description.raw, 5.0);
        assert_eq!(scores.about_game.raw, 3.0);
        assert_eq!(scores.genres.raw, 4.0);
        assert_eq!(scores.highlight_images.raw, 2.0);
        assert_eq!(scores.capsule_image.raw, 4.0);
        assert_eq!(scores.description.strengths, "Clear and concise.");
    }

    #[test]
    fn test_numeric_score_is_accepted() {
        let text = model_json(["5", "3", "4", "2", "4"]).replace("\"score\":\"3\"", "\"score\":3");
        let scores = parse(&text).unwrap();
        assert_eq!(scores.about_game.raw, 3.0);
    }

    #[test]
    fn test_non_numeric_score_is_score_parse_error() {
        let result = parse(&model_json(["5", "three", "4", "2", "4"]));
        assert!(matches!(result, Err(RatingError::ScoreParse(_))));
    }

    #[test]
    fn test_out_of_range_score_is_score_parse_error() {
        let result = parse(&model_json(["10", "3", "4", "2", "4"]));
        assert!(matches!(result, Err(RatingError::ScoreParse(_))));
    }

    #[tokio::test]
    async fn test_score_calls_model_once_and_returns_prompt() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gemini_body(&format!(
                "```json\n{}\n```",
                model_json(["4", "4", "3", "5", "2"])
            )))
            .expect(1)
            .create_async()
            .await;

        let scorer = TextScorer::new(LlmClient::with_base_url("k".to_string(), server.url()));
        let genres = vec!["Action".to_string()];
        let (scores, prompt) = scorer.score(&context(&genres, &[])).await.unwrap();

        assert_eq!(scores.highlight_images.raw, 5.0);
        assert!(prompt.contains("Genres: Action"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_section_is_score_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gemini_body(r#"{"description": {"score": "5"}}"#))
            .create_async()
            .await;

        let scorer = TextScorer::new(LlmClient::with_base_url("k".to_string(), server.url()));
        let genres = vec!["Action".to_string()];
        let result = scorer.score(&context(&genres, &[])).await;
        assert!(matches!(result, Err(RatingError::ScoreParse(_))));
    }

    #[tokio::test]
    async fn test_malformed_model_response_is_score_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let scorer = TextScorer::new(LlmClient::with_base_url("k".to_string(), server.url()));
        let genres = vec!["Action".to_string()];
        let result = scorer.score(&context(&genres, &[])).await;
        assert!(matches!(result, Err(RatingError::ScoreParse(_))));
    }

    #[tokio::test]
    async fn test_model_rate_limit_is_propagated() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let scorer = TextScorer::new(LlmClient::with_base_url("k".to_string(), server.url()));
        let genres = vec!["Action".to_string()];
        let result = scorer.score(&context(&genres, &[])).await;
        assert!(matches!(result, Err(RatingError::RateLimited(_))));
    }
}
