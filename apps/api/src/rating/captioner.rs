//! Image Captioner: concurrent download + vision captioning of page images.
//!
//! One task per image, all joined at a single barrier. Each task owns its inputs and reports
//! back with its slot index, so results land in the pre-allocated slots with no shared state.
//! A failed image leaves its slot empty; the batch itself never fails.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::rating::error::CaptionError;
use crate::rating::models::{ImageRef, ImageRole, PageContent};
use crate::rating::prompts::{fill_template, CAPSULE_CAPTION_PROMPT, HIGHLIGHT_CAPTION_TEMPLATE};
use crate::vision_client::VisionClient;

pub const MAX_HIGHLIGHT_IMAGES: usize = 3;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// First highlight images plus the capsule image, in that order.
pub fn select_images(page: &PageContent) -> Vec<ImageRef> {
    page.highlight_image_urls
        .iter()
        .take(MAX_HIGHLIGHT_IMAGES)
        .map(|url| ImageRef::new(url.as_str(), ImageRole::Highlight))
        .chain(std::iter::once(ImageRef::new(
            page.capsule_image_url.as_str(),
            ImageRole::Capsule,
        )))
        .collect()
}

pub fn instruction(role: ImageRole, genres: &[String]) -> String {
    match role {
        ImageRole::Highlight => {
            let genres = genres.join(", ");
            fill_template(HIGHLIGHT_CAPTION_TEMPLATE, &[("genres", genres.as_str())])
        }
        ImageRole::Capsule => CAPSULE_CAPTION_PROMPT.to_string(),
    }
}

#[derive(Clone)]
pub struct ImageCaptioner {
    client: Client,
    vision: VisionClient,
}

impl ImageCaptioner {
    pub fn new(vision: VisionClient) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            vision,
        }
    }

    /// Captions every image it can before `deadline`. Slots whose task failed or was still
    /// running at the deadline keep an empty caption.
    pub async fn caption(
        &self,
        mut images: Vec<ImageRef>,
        genres: &[String],
        deadline: Instant,
    ) -> Vec<ImageRef> {
        let mut tasks = JoinSet::new();

        for (idx, image) in images.iter().enumerate() {
            let client = self.client.clone();
            let vision = self.vision.clone();
            let url = image.url.clone();
            let prompt = instruction(image.role, genres);

            tasks.spawn(async move {
                let (bytes, caption) = caption_one(&client, &vision, &url, &prompt).await;
                (idx, bytes, caption)
            });
        }

        let fan_in = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((idx, bytes, Ok(caption))) => {
                        images[idx].bytes = bytes;
                        images[idx].caption = caption;
                    }
                    Ok((idx, bytes, Err(e))) => {
                        warn!(rate_limited = e.is_rate_limited(), "Captioning failed: {}", e);
                        images[idx].bytes = bytes;
                    }
                    Err(e) => warn!("Caption task did not complete: {}", e),
                }
            }
        };

        if timeout_at(deadline, fan_in).await.is_err() {
            warn!("Captioning deadline reached, aborting {} task(s)", tasks.len());
            tasks.abort_all();
        }

        let captioned = images.iter().filter(|i| !i.caption.is_empty()).count();
        info!("Captioned {}/{} images", captioned, images.len());

        images
    }
}

/// Downloads one image and asks the vision model for a caption. The downloaded bytes are
/// returned even when captioning fails.
async fn caption_one(
    client: &Client,
    vision: &VisionClient,
    url: &str,
    prompt: &str,
) -> (Bytes, Result<String, CaptionError>) {
    let bytes = match download(client, url).await {
        Ok(bytes) => bytes,
        Err(e) => return (Bytes::new(), Err(e)),
    };

    let caption = vision
        .describe(&bytes, prompt)
        .await
        .map_err(|source| CaptionError::Vision {
            url: url.to_string(),
            source,
        });

    (bytes, caption)
}

async fn download(client: &Client, url: &str) -> Result<Bytes, CaptionError> {
    let failed = |reason: String| CaptionError::Download {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("status {status}")));
    }

    response.bytes().await.map_err(|e| failed(e.to_string()))
}
