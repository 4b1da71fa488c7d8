//! Per-IP rate limiting (spec.md §5): `/auth` 30 req/min, `/token*` 20
//! req/min, global 100 req/min. Built on `governor`'s keyed rate limiter,
//! the token-bucket primitive the teacher's health-check module reaches
//! for to bound retry/probe rates.

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter as GovernorRateLimiter,
};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

type KeyedLimiter = GovernorRateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

#[derive(Clone)]
pub struct RateLimiters {
    auth: Arc<KeyedLimiter>,
    token: Arc<KeyedLimiter>,
    global: Arc<KeyedLimiter>,
}

fn per_minute(count: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(count).expect("nonzero rate limit"))
}

impl RateLimiters {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(GovernorRateLimiter::keyed(per_minute(30))),
            token: Arc::new(GovernorRateLimiter::keyed(per_minute(20))),
            global: Arc::new(GovernorRateLimiter::keyed(per_minute(100))),
        }
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

async fn check(
    limiters: &RateLimiters,
    ip: IpAddr,
    path: &str,
) -> Result<(), Response> {
    if limiters.global.check_key(&ip).is_err() {
        return Err(too_many_requests());
    }
    if path.starts_with("/auth") && limiters.auth.check_key(&ip).is_err() {
        return Err(too_many_requests());
    }
    if path.starts_with("/token") && limiters.token.check_key(&ip).is_err() {
        return Err(too_many_requests());
    }
    Ok(())
}

fn too_many_requests() -> Response {
    use axum::response::IntoResponse;
    (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
}

pub async fn rate_limit_middleware(
    State(limiters): State<RateLimiters>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if let Err(response) = check(&limiters, addr.ip(), &path).await {
        return response;
    }
    next.run(request).await
}
