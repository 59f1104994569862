// Rating engine: page extraction, image captioning, tag and text scoring, aggregation.
// Text-model calls go through llm_client and image captions through vision_client.

pub mod aggregator;
pub mod captioner;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod sink;
pub mod tag_scoring;
pub mod text_scoring;
