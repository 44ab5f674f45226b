//! Rate limiting middleware.
//!
//! Per-client limits for the public form routes, keyed by the first
//! `X-Forwarded-For` hop.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::DefaultClock, DefaultKeyedRateLimiter, Quota, RateLimiter as GovRateLimiter};
use serde_json::json;
use std::num::NonZeroU32;

use crate::app::AppState;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Rate limiter state shared across all requests.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// Creates a limiter allowing `rate_limit_per_minute` requests per client.
    ///
    /// Returns `None` for a limit of zero, which disables rate limiting.
    pub fn new(rate_limit_per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiter: GovRateLimiter::keyed(Quota::per_minute(per_minute)),
            rate_limit_per_minute,
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Check if a request from the given client should be allowed.
    /// Returns Ok(()) if allowed, or Err with retry_after seconds if rate limited.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        match self.limiter.check_key(&client.to_string()) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time = not_until.wait_time_from(governor::clock::Clock::now(
                    &DefaultClock::default(),
                ));
                Err(wait_time.as_secs().max(1))
            }
        }
    }

    /// Drops limiter state for clients that are back at full quota.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("tracked_clients", &self.limiter.len())
            .finish()
    }
}

/// Client address from the first `X-Forwarded-For` hop.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Middleware that applies rate limiting per client IP.
///
/// Requests without a forwarded client address pass through unlimited.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (Some(rate_limiter), Some(client)) = (state.rate_limiter.as_ref(), client_ip(req.headers()))
    else {
        return next.run(req).await;
    };

    if let Err(retry_after) = rate_limiter.check(&client) {
        tracing::warn!(
            path = %req.uri().path(),
            retry_after_secs = retry_after,
            "Form submission rate limited"
        );
        return rate_limited_response(rate_limiter.rate_limit_per_minute(), retry_after);
    }

    next.run(req).await
}

/// Create a rate limited response with proper headers and body.
fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retry_after": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));

    response
}
