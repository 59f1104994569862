//! Rating Pipeline: drives one request from URL to `RatingResult`.
//!
//! Flow: Fetching → Extracted → Captioning → TextScoring → Aggregating → Done.
//! `Failed` is reachable only from Fetching, Extracted and TextScoring. Captioning and
//! aggregation cannot fail the request.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::rating::aggregator::aggregate;
use crate::rating::captioner::{select_images, ImageCaptioner};
use crate::rating::error::RatingError;
use crate::rating::fetcher::{PageFetcher, StoreUrl};
use crate::rating::models::{ImageRef, ImageRole, RatingResult};
use crate::rating::sink::{RatingRecord, RatingSink};
use crate::rating::tag_scoring;
use crate::rating::text_scoring::{TextContext, TextScorer};

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingStage {
    Fetching,
    Extracted,
    Captioning,
    TextScoring,
    Aggregating,
    Done,
    Failed,
}

impl RatingStage {
    /// The next stage on the success path. Terminal stages stay put.
    pub fn advance(self) -> RatingStage {
        match self {
            RatingStage::Fetching => RatingStage::Extracted,
            RatingStage::Extracted => RatingStage::Captioning,
            RatingStage::Captioning => RatingStage::TextScoring,
            RatingStage::TextScoring => RatingStage::Aggregating,
            RatingStage::Aggregating => RatingStage::Done,
            RatingStage::Done => RatingStage::Done,
            RatingStage::Failed => RatingStage::Failed,
        }
    }

    /// `Some(Failed)` if a request may fail while in this stage.
    pub fn fail(self) -> Option<RatingStage> {
        match self {
            RatingStage::Fetching | RatingStage::Extracted | RatingStage::TextScoring => {
                Some(RatingStage::Failed)
            }
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RatingStage::Done | RatingStage::Failed)
    }
}

impl fmt::Display for RatingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RatingStage::Fetching => "fetching",
            RatingStage::Extracted => "extracted",
            RatingStage::Captioning => "captioning",
            RatingStage::TextScoring => "text scoring",
            RatingStage::Aggregating => "aggregating",
            RatingStage::Done => "done",
            RatingStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current stage of one request, with transition logging.
struct StageTracker<'a> {
    url: &'a str,
    stage: RatingStage,
}

impl<'a> StageTracker<'a> {
    fn new(url: &'a str) -> Self {
        info!(url, stage = %RatingStage::Fetching, "Rating started");
        Self {
            url,
            stage: RatingStage::Fetching,
        }
    }

    fn advance(&mut self) {
        if self.stage.is_terminal() {
            return;
        }
        let next = self.stage.advance();
        info!(url = self.url, from = %self.stage, to = %next, "Rating stage advanced");
        self.stage = next;
    }

    fn fail(&mut self, err: RatingError) -> RatingError {
        match self.stage.fail() {
            Some(failed) => {
                error!(url = self.url, stage = %self.stage, "Rating failed: {}", err);
                self.stage = failed;
            }
            None => warn!(
                url = self.url,
                stage = %self.stage,
                "Error raised in a stage that cannot fail: {}", err
            ),
        }
        err
    }

    /// Runs one failable stage under the request deadline.
    async fn run<T, F>(&mut self, deadline: Instant, stage: F) -> Result<T, RatingError>
    where
        F: Future<Output = Result<T, RatingError>>,
    {
        match timeout_at(deadline, stage).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => {
                let stage = self.stage;
                Err(self.fail(RatingError::Timeout { stage }))
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RatingPipeline {
    fetcher: PageFetcher,
    captioner: ImageCaptioner,
    text_scorer: TextScorer,
    sink: Arc<dyn RatingSink>,
    deadline: Duration,
}

impl RatingPipeline {
    pub fn new(
        fetcher: PageFetcher,
        captioner: ImageCaptioner,
        text_scorer: TextScorer,
        sink: Arc<dyn RatingSink>,
        deadline: Duration,
    ) -> Self {
        Self {
            fetcher,
            captioner,
            text_scorer,
            sink,
            deadline,
        }
    }

    /// Rates one store page. Nothing partial is ever returned.
    pub async fn rate(&self, raw_url: &str) -> Result<RatingResult, RatingError> {
        let deadline = Instant::now() + self.deadline;
        let mut tracker = StageTracker::new(raw_url);

        // Fetching
        let url = self.fetcher.parse_url(raw_url).map_err(|e| tracker.fail(e))?;
        let page = tracker.run(deadline, self.fetcher.fetch(&url)).await?;
        info!(
            "Extracted page: {} tags, {} genres, {} highlight images",
            page.tags.len(),
            page.genres.len(),
            page.highlight_image_urls.len()
        );
        tracker.advance();

        // Extracted
        if Instant::now() >= deadline {
            let stage = tracker.stage;
            return Err(tracker.fail(RatingError::Timeout { stage }));
        }
        let images = select_images(&page);
        tracker.advance();

        // Captioning
        let images = self.captioner.caption(images, &page.genres, deadline).await;
        tracker.advance();

        // TextScoring
        let (highlight_captions, capsule_caption) = split_captions(&images);
        let tag_score = tag_scoring::score(&page.genres, &page.tags);
        let ctx = TextContext {
            description: &page.description,
            about_text: &page.about_text,
            genres: &page.genres,
            highlight_captions: &highlight_captions,
            capsule_caption: &capsule_caption,
        };
        let (text_scores, prompt) = tracker.run(deadline, self.text_scorer.score(&ctx)).await?;
        tracker.advance();

        // Aggregating
        let result = aggregate(text_scores, tag_score, &page.capsule_image_url);
        tracker.advance();

        info!(
            url = raw_url,
            score = result.final_weighted_score,
            "Rating complete"
        );
        self.hand_off(&url, &result, prompt);

        Ok(result)
    }

    /// Sends the record to the sink on a detached task. Sink failures never reach the caller.
    fn hand_off(&self, url: &StoreUrl, result: &RatingResult, prompt: String) {
        let record = match RatingRecord::new(url, result, prompt) {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not build rating record: {}", e);
                return;
            }
        };

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.record(record).await {
                error!("Rating sink failed: {e:?}");
            }
        });
    }
}

fn split_captions(images: &[ImageRef]) -> (Vec<String>, String) {
    let highlights = images
        .iter()
        .filter(|i| i.role == ImageRole::Highlight)
        .map(|i| i.caption.clone())
        .collect();
    let capsule = images
        .iter()
        .find(|i| i.role == ImageRole::Capsule)
        .map(|i| i.caption.clone())
        .unwrap_or_default();
    (highlights, capsule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use tokio::sync::mpsc;

    use crate::llm_client::LlmClient;
    use crate::rating::fetcher::tests::{page_html, SAMPLE_TAGS};
    use crate::rating::text_scoring::tests::{gemini_body, model_json};
    use crate::vision_client::VisionClient;

    struct ChannelSink(mpsc::UnboundedSender<RatingRecord>);

    #[async_trait]
    impl RatingSink for ChannelSink {
        async fn record(&self, record: RatingRecord) -> anyhow::Result<()> {
            self.0.send(record)?;
            Ok(())
        }
    }

    fn pipeline(
        server: &ServerGuard,
        deadline: Duration,
    ) -> (RatingPipeline, mpsc::UnboundedReceiver<RatingRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = PageFetcher::with_endpoints(
            "127.0.0.1",
            &format!("{}/agecheck/app/1840080/", server.url()),
            &format!("{}/agecheckset/app/1840080/", server.url()),
        );
        let captioner = ImageCaptioner::new(VisionClient::with_base_url(
            &server.url(),
            "acct",
            "k".to_string(),
        ));
        let text_scorer = TextScorer::new(LlmClient::with_base_url("k".to_string(), server.url()));
        let pipeline = RatingPipeline::new(
            fetcher,
            captioner,
            text_scorer,
            Arc::new(ChannelSink(tx)),
            deadline,
        );
        (pipeline, rx)
    }

    async fn mock_store(server: &mut ServerGuard) -> Vec<Mock> {
        let html = page_html(&SAMPLE_TAGS, true).replace("https://cdn.example", &server.url());
        vec![
            server
                .mock("GET", "/app/42/ashen_crown/")
                .with_status(200)
                .with_body(html)
                .create_async()
                .await,
            server
                .mock("GET", Matcher::Regex(r"^/apps/1/.*\.jpg$".to_string()))
                .with_status(200)
                .with_body([1u8, 2, 3])
                .create_async()
                .await,
            server
                .mock("POST", Matcher::Regex("llava".to_string()))
                .with_status(200)
                .with_body(
                    r#"{"result":{"description":"A knight at a burning castle."},"success":true,"errors":[],"messages":[]}"#,
                )
                .create_async()
                .await,
        ]
    }

    #[test]
    fn test_stage_order() {
        let mut stage = RatingStage::Fetching;
        let mut seen = vec![stage];
        while !stage.is_terminal() {
            stage = stage.advance();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                RatingStage::Fetching,
                RatingStage::Extracted,
                RatingStage::Captioning,
                RatingStage::TextScoring,
                RatingStage::Aggregating,
                RatingStage::Done,
            ]
        );
    }

    #[test]
    fn test_failed_only_from_failable_stages() {
        assert_eq!(RatingStage::Fetching.fail(), Some(RatingStage::Failed));
        assert_eq!(RatingStage::Extracted.fail(), Some(RatingStage::Failed));
        assert_eq!(RatingStage::TextScoring.fail(), Some(RatingStage::Failed));
        assert_eq!(RatingStage::Captioning.fail(), None);
        assert_eq!(RatingStage::Aggregating.fail(), None);
        assert_eq!(RatingStage::Done.fail(), None);
    }

    #[test]
    fn test_split_captions_by_role() {
        let mut highlight = ImageRef::new("h", ImageRole::Highlight);
        highlight.caption = "h caption".to_string();
        let mut capsule = ImageRef::new("c", ImageRole::Capsule);
        capsule.caption = "c caption".to_string();

        let (highlights, capsule) = split_captions(&[highlight, capsule]);
        assert_eq!(highlights, vec!["h caption"]);
        assert_eq!(capsule, "c caption");
    }

    #[tokio::test]
    async fn test_rate_end_to_end() {
        let mut server = Server::new_async().await;
        let _store = mock_store(&mut server).await;
        let llm = server
            .mock("POST", Matcher::Regex("generateContent".to_string()))
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex("A knight at a burning castle.".to_string()))
            .with_status(200)
            .with_body(gemini_body(&model_json(["5", "3", "3", "2", "4"])))
            .expect(1)
            .create_async()
            .await;

        let (pipeline, mut rx) = pipeline(&server, Duration::from_secs(30));
        let url = format!("{}/app/42/ashen_crown/", server.url());
        let result = pipeline.rate(&url).await.unwrap();

        // Description 100, Tags 40, Highlights 40, Genres 60, About 60, Capsule 80
        assert_eq!(result.final_weighted_score, 72);
        assert_eq!(result.component_ratings.len(), 6);
        assert_eq!(result.component_ratings[1].score, "40");
        assert_eq!(
            result.capsule_url,
            format!("{}/apps/1/capsule.jpg", server.url())
        );
        llm.assert_async().await;

        let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.app_id, "42");
        assert_eq!(record.slug, "ashen_crown");
        assert_eq!(record.score, 72);
        assert!(record.prompt.contains("A knight at a burning castle."));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_network() {
        let server = Server::new_async().await;
        let (pipeline, mut rx) = pipeline(&server, Duration::from_secs(30));

        let result = pipeline
            .rate("https://example.com/app/42/ashen_crown/")
            .await;
        assert!(matches!(result, Err(RatingError::InvalidUrl(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_text_model_failure_fails_request() {
        let mut server = Server::new_async().await;
        let _store = mock_store(&mut server).await;
        let _llm = server
            .mock("POST", Matcher::Regex("generateContent".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gemini_body("not json at all"))
            .create_async()
            .await;

        let (pipeline, mut rx) = pipeline(&server, Duration::from_secs(30));
        let url = format!("{}/app/42/ashen_crown/", server.url());
        let result = pipeline.rate(&url).await;

        assert!(matches!(result, Err(RatingError::ScoreParse(_))));
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_zero_deadline_times_out_while_fetching() {
        let server = Server::new_async().await;
        let (pipeline, _rx) = pipeline(&server, Duration::ZERO);

        let url = format!("{}/app/42/ashen_crown/", server.url());
        let result = pipeline.rate(&url).await;
        assert!(matches!(
            result,
            Err(RatingError::Timeout {
                stage: RatingStage::Fetching
            })
        ));
    }
}
