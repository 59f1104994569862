//! Page Fetcher: downloads a store page and extracts the sections the rater needs.
//!
//! If the primary (capsule) section is missing on the first fetch the page is assumed to be
//! behind the age gate. The gate is passed once with a fixed birthdate and the page is
//! fetched again. There is no further retry.

use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::rating::error::{PageSection, RatingError};
use crate::rating::models::PageContent;

pub const STORE_HOST: &str = "store.steampowered.com";

// The age gate endpoints reference a fixed app rather than the page being rated.
// A session verified there is accepted for any app.
const AGE_CHECK_URL: &str = "https://store.steampowered.com/agecheck/app/1840080/";
const AGE_CHECK_SET_URL: &str = "https://store.steampowered.com/agecheckset/app/1840080/";
const SESSION_COOKIE: &str = "sessionid";
const BIRTH_DAY: &str = "23";
const BIRTH_MONTH: &str = "2";
const BIRTH_YEAR: &str = "1992";

const ABOUT_HEADING: &str = "About This Game";
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ────────────────────────────────────────────────────────────────────────────
// Store URL
// ────────────────────────────────────────────────────────────────────────────

/// A validated store page URL: `https://<store host>/app/<app id>/<slug>/`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreUrl {
    url: Url,
    app_id: String,
    slug: String,
}

impl StoreUrl {
    pub fn parse(raw: &str, expected_host: &str) -> Result<Self, RatingError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RatingError::InvalidUrl("store page url is required".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| RatingError::InvalidUrl(format!("{e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RatingError::InvalidUrl(format!(
                "unsupported url scheme '{}'",
                url.scheme()
            )));
        }

        if url.host_str() != Some(expected_host) {
            return Err(RatingError::InvalidUrl(format!(
                "url host must be {expected_host}"
            )));
        }

        let mut segments = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();

        let app_id = match (segments.next(), segments.next()) {
            (Some("app"), Some(id)) if id.chars().all(|c| c.is_ascii_digit()) => id.to_string(),
            _ => {
                return Err(RatingError::InvalidUrl(
                    "url path must look like /app/<app id>/<name>/".to_string(),
                ))
            }
        };
        let slug = segments.next().unwrap_or_default().to_string();

        Ok(Self { url, app_id, slug })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fetcher
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    store_host: String,
    age_check_url: String,
    age_check_set_url: String,
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFetcher {
    pub fn new() -> Self {
        Self::with_endpoints(STORE_HOST, AGE_CHECK_URL, AGE_CHECK_SET_URL)
    }

    pub fn with_endpoints(store_host: &str, age_check_url: &str, age_check_set_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            store_host: store_host.to_string(),
            age_check_url: age_check_url.to_string(),
            age_check_set_url: age_check_set_url.to_string(),
        }
    }

    /// Validates a user-supplied url against the configured store host.
    pub fn parse_url(&self, raw: &str) -> Result<StoreUrl, RatingError> {
        StoreUrl::parse(raw, &self.store_host)
    }

    /// Fetches and extracts the page, passing the age gate at most once.
    pub async fn fetch(&self, url: &StoreUrl) -> Result<PageContent, RatingError> {
        let html = self.get_page(url.as_str(), None).await?;

        match extract_page(&html) {
            Err(RatingError::Extraction {
                field: PageSection::PrimarySection,
            }) => {}
            extracted => return extracted,
        }

        info!("Primary section missing for {}, attempting age gate", url.as_str());
        let html = self.pass_age_gate(url).await?;

        let extracted = extract_page(&html);
        if let Err(RatingError::Extraction {
            field: PageSection::PrimarySection,
        }) = extracted
        {
            warn!("Primary section still missing after age gate for {}", url.as_str());
        }
        extracted
    }

    async fn get_page(&self, url: &str, cookies: Option<&str>) -> Result<String, RatingError> {
        let mut request = self.client.get(url);
        if let Some(cookies) = cookies {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RatingError::Fetch(format!("store page returned status {status}")));
        }

        Ok(response.text().await?)
    }

    /// Runs verify → confirm → refetch and returns the refetched page body.
    async fn pass_age_gate(&self, url: &StoreUrl) -> Result<String, RatingError> {
        // Step 1: obtain a session id
        let response = self.client.get(&self.age_check_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RatingError::Fetch(format!(
                "age verification page returned status {status}"
            )));
        }

        let session_id = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RatingError::AgeGate("session id cookie not found".to_string()))?;
        debug!("Obtained age gate session");

        // Step 2: confirm the birthdate
        let session_cookie = format!("{SESSION_COOKIE}={session_id}");
        let form = [
            ("sessionid", session_id.as_str()),
            ("ageDay", BIRTH_DAY),
            ("ageMonth", BIRTH_MONTH),
            ("ageYear", BIRTH_YEAR),
        ];

        let response = self
            .client
            .post(&self.age_check_set_url)
            .header(COOKIE, &session_cookie)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RatingError::Fetch(format!(
                "age confirmation returned status {status}"
            )));
        }

        // Step 3: refetch with every cookie the confirmation set, plus the session
        let mut cookies: Vec<String> = response
            .cookies()
            .filter(|c| c.name() != SESSION_COOKIE)
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect();
        cookies.push(session_cookie);

        self.get_page(url.as_str(), Some(&cookies.join("; "))).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extracts every required section, failing on the first one that is missing.
pub fn extract_page(html: &str) -> Result<PageContent, RatingError> {
    let document = Html::parse_document(html);

    let primary = document
        .select(&selector(".glance_ctn"))
        .next()
        .ok_or(RatingError::missing(PageSection::PrimarySection))?;

    let description = primary
        .select(&selector(".game_description_snippet"))
        .next()
        .map(text_of)
        .filter(|d| !d.is_empty())
        .ok_or(RatingError::missing(PageSection::Description))?;

    let mut tags: Vec<String> = primary
        .select(&selector(".glance_tags.popular_tags .app_tag"))
        .map(text_of)
        .collect();
    // last entry is the "+" more-tags button
    tags.pop();
    if tags.is_empty() {
        return Err(RatingError::missing(PageSection::Tags));
    }

    let genre_block = document
        .select(&selector("#appDetailsUnderlinedLinks"))
        .next()
        .ok_or(RatingError::missing(PageSection::GenreBlock))?;
    let genres: Vec<String> = genre_block
        .select(&selector("#genresAndManufacturer > span:first-of-type a"))
        .map(text_of)
        .filter(|g| !g.is_empty())
        .collect();
    if genres.is_empty() {
        return Err(RatingError::missing(PageSection::Genres));
    }

    let capsule_image_url = document
        .select(&selector(r#"link[rel="image_src"]"#))
        .find_map(|link| link.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .ok_or(RatingError::missing(PageSection::CapsuleImage))?;

    let highlight_area = document
        .select(&selector("#highlight_player_area"))
        .next()
        .ok_or(RatingError::missing(PageSection::HighlightImages))?;
    let highlight_image_urls: Vec<String> = highlight_area
        .select(&selector("a"))
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect();
    if highlight_image_urls.is_empty() {
        return Err(RatingError::missing(PageSection::HighlightImages));
    }

    let about = document
        .select(&selector("#game_area_description"))
        .next()
        .ok_or(RatingError::missing(PageSection::AboutSection))?;
    let about_text = about
        .text()
        .collect::<String>()
        .replacen(ABOUT_HEADING, "", 1)
        .trim()
        .to_string();
    if about_text.is_empty() {
        return Err(RatingError::missing(PageSection::AboutSection));
    }

    let about_image_urls = about
        .select(&selector("img"))
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect();
    let about_links = about
        .select(&selector("a"))
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();

    Ok(PageContent {
        description,
        genres,
        tags,
        capsule_image_url,
        highlight_image_urls,
        about_text,
        about_links,
        about_image_urls,
    })
}
