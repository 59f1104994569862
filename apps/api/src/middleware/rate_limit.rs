//! Per-client rate limiting for the rating routes.
//!
//! Each client IP gets `RATE_LIMIT_PER_DAY` requests, replenished evenly over 24 hours with a
//! burst of the full quota. Disabled entirely in `DEV`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// How often idle client entries are pruned.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

pub type ClientLimiter = DefaultKeyedRateLimiter<IpAddr>;

pub fn build_limiter(per_day: u32) -> Arc<ClientLimiter> {
    let per_day = NonZeroU32::new(per_day).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(QUOTA_WINDOW / per_day.get())
        .unwrap_or_else(|| Quota::per_second(per_day))
        .allow_burst(per_day);
    Arc::new(RateLimiter::keyed(quota))
}

/// Background task that forgets clients whose quota has fully replenished.
pub fn spawn_cleanup(limiter: Arc<ClientLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
            debug!("Rate limiter tracking {} client(s)", limiter.len());
        }
    });
}

/// Forwarded address first, then the socket peer address.
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(limiter) = state.limiter.as_ref() {
        let ip = client_ip(&request);
        if limiter.check_key(&ip).is_err() {
            warn!(%ip, "Client exceeded rating quota");
            return Err(AppError::TooManyRequests);
        }
    }

    Ok(next.run(request).await)
}
