//! Aggregator: rescales the six raw scores and folds them into one weighted rating.

use tracing::debug;

use crate::rating::models::{Component, ComponentRating, ComponentScore, RatingResult};
use crate::rating::text_scoring::TextScores;

/// Raw scores are 0–5; reported scores are 0–100.
const SCORE_MULTIPLIER: f64 = 20.0;

/// Unrounded 0–100 value. Truncation happens only when a score is reported.
pub fn rescale(raw: f64) -> f64 {
    (raw * SCORE_MULTIPLIER).clamp(0.0, 100.0)
}

/// Builds the final result. Component scores and the weighted total are truncated, never rounded.
pub fn aggregate(text: TextScores, tags: ComponentScore, capsule_url: &str) -> RatingResult {
    let TextScores {
        description,
        about_game,
        genres,
        highlight_images,
        capsule_image,
    } = text;

    // same order as Component::ALL
    let ordered = [
        (Component::Description, description),
        (Component::Tags, tags),
        (Component::HighlightImages, highlight_images),
        (Component::Genres, genres),
        (Component::AboutGame, about_game),
        (Component::CapsuleImage, capsule_image),
    ];

    let mut weighted_sum = 0.0_f64;
    let component_ratings = ordered
        .into_iter()
        .map(|(component, score)| {
            let rescaled = rescale(score.raw);
            debug!("{}: raw {} -> {}", component, score.raw, rescaled);
            weighted_sum += rescaled * f64::from(component.weight_percent());
            ComponentRating {
                component,
                score: (rescaled as u32).to_string(),
                actionable_feedback: score.actionable_feedback,
                strengths: score.strengths,
            }
        })
        .collect();

    RatingResult {
        final_weighted_score: (weighted_sum / 100.0) as u32,
        capsule_url: capsule_url.to_string(),
        component_ratings,
    }
}
