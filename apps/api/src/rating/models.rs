//! Data models shared by every stage of the rating engine.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Scraped page
// ────────────────────────────────────────────────────────────────────────────

/// Everything the rating engine reads from a store page.
/// Only ever constructed fully populated; extraction failures never yield a partial value.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub description: String,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub capsule_image_url: String,
    pub highlight_image_urls: Vec<String>,
    pub about_text: String,
    pub about_links: Vec<String>,
    pub about_image_urls: Vec<String>,
}

/// What an image is on the page. Drives the captioning instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRole {
    Highlight,
    Capsule,
}

/// A page image moving through captioning. Bytes and caption stay empty on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub url: String,
    pub role: ImageRole,
    pub bytes: Bytes,
    pub caption: String,
}

impl ImageRef {
    pub fn new(url: impl Into<String>, role: ImageRole) -> Self {
        Self {
            url: url.into(),
            role,
            bytes: Bytes::new(),
            caption: String::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scores
// ────────────────────────────────────────────────────────────────────────────

/// The six rated components. Closed set: the display name and weight are fixed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "Description")]
    Description,
    #[serde(rename = "Tags")]
    Tags,
    #[serde(rename = "Highlight Images")]
    HighlightImages,
    #[serde(rename = "Genres")]
    Genres,
    #[serde(rename = "About Game")]
    AboutGame,
    #[serde(rename = "Capsule Image")]
    CapsuleImage,
}

impl Component {
    /// Result order of the component list.
    pub const ALL: [Component; 6] = [
        Component::Description,
        Component::Tags,
        Component::HighlightImages,
        Component::Genres,
        Component::AboutGame,
        Component::CapsuleImage,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Component::Description => "Description",
            Component::Tags => "Tags",
            Component::HighlightImages => "Highlight Images",
            Component::Genres => "Genres",
            Component::AboutGame => "About Game",
            Component::CapsuleImage => "Capsule Image",
        }
    }

    /// Weight in percent. All six sum to 100.
    pub fn weight_percent(self) -> u32 {
        match self {
            Component::Description => 30,
            Component::Genres => 10,
            Component::Tags => 10,
            Component::HighlightImages => 10,
            Component::CapsuleImage => 20,
            Component::AboutGame => 20,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A raw component score as produced by the tag or text scorer (0–5 scale).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScore {
    pub raw: f64,
    pub actionable_feedback: String,
    pub strengths: String,
}

/// One line of the public breakdown. `score` is the 0–100 value rendered as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRating {
    pub component: Component,
    pub score: String,
    #[serde(rename = "actionablefeedback")]
    pub actionable_feedback: String,
    #[serde(default)]
    pub strengths: String,
}

/// Final output of one rating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResult {
    pub final_weighted_score: u32,
    pub capsule_url: String,
    pub component_ratings: Vec<ComponentRating>,
}
