use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:4321,https://gamedevreststop.com";

/// Deployment environment. Rate limiting is switched off in `Dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("dev") {
            Environment::Dev
        } else {
            Environment::Prod
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub cloudflare_account_id: String,
    pub cloudflare_api_key: String,
    pub gemini_api_key: String,
    pub environment: Environment,
    pub port: u16,
    pub rust_log: String,
    pub allowed_origins: Vec<String>,
    /// Overall budget for one rating request, captioning included.
    pub rating_deadline: Duration,
    /// Rating requests a single client may issue per 24 hours.
    pub rate_limit_per_day: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            cloudflare_account_id: require_env("CLOUDFLARE_ACCOUNT_ID")?,
            cloudflare_api_key: require_env("CLOUDFLARE_API_KEY")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            environment: Environment::parse(
                &std::env::var("ENVIRONMENT").unwrap_or_else(|_| "PROD".to_string()),
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8082".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            allowed_origins: parse_origins(
                &std::env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            rating_deadline: Duration::from_secs(
                std::env::var("RATING_DEADLINE_SECS")
                    .unwrap_or_else(|_| "180".to_string())
                    .parse::<u64>()
                    .context("RATING_DEADLINE_SECS must be a number of seconds")?,
            ),
            rate_limit_per_day: std::env::var("RATE_LIMIT_PER_DAY")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u32>()
                .context("RATE_LIMIT_PER_DAY must be a positive integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
