mod config;
mod errors;
mod llm_client;
mod middleware;
mod rating;
mod routes;
mod state;
mod vision_client;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, Environment};
use crate::llm_client::LlmClient;
use crate::middleware::rate_limit::{build_limiter, spawn_cleanup};
use crate::rating::captioner::ImageCaptioner;
use crate::rating::fetcher::PageFetcher;
use crate::rating::pipeline::RatingPipeline;
use crate::rating::sink::TracingSink;
use crate::rating::text_scoring::TextScorer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vision_client::VisionClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Storefront Rater v{}", env!("CARGO_PKG_VERSION"));

    // Model clients
    let llm = LlmClient::new(config.gemini_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let vision = VisionClient::new(
        &config.cloudflare_account_id,
        config.cloudflare_api_key.clone(),
    );

    // Rating pipeline
    let pipeline = RatingPipeline::new(
        PageFetcher::new(),
        ImageCaptioner::new(vision),
        TextScorer::new(llm),
        Arc::new(TracingSink),
        config.rating_deadline,
    );
    info!("Rating deadline: {:?}", config.rating_deadline);

    // Per-client limiter, off in DEV
    let limiter = match config.environment {
        Environment::Dev => {
            warn!("DEV environment: rate limiting disabled");
            None
        }
        Environment::Prod => {
            let limiter = build_limiter(config.rate_limit_per_day);
            spawn_cleanup(Arc::clone(&limiter));
            info!("Rate limit: {} ratings per client per day", config.rate_limit_per_day);
            Some(limiter)
        }
    };

    let state = AppState { pipeline, limiter };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

fn build_cors(config: &Config) -> Result<CorsLayer> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid origin in ALLOWED_ORIGINS: {o}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
