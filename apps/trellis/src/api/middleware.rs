//! # Rate Limiting
//!
//! Per-application rate limiting for the wizard API.
//!
//! The API is application-scoped: one applicant hammering saves on their
//! own wizard must not starve another applicant's session. Requests
//! under `/applications/{id}/...` therefore draw from a quota keyed by
//! the application id; registry-level routes (create, list, status,
//! reference data) share one bucket.
//!
//! Configured via `TRELLIS_RATE_LIMIT` (requests per second per bucket,
//! default 100, 0 disables the layer).

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::types::RejectionResponse;

/// Default quota: 100 requests per second per bucket.
const DEFAULT_RPS: NonZeroU32 = NonZeroU32::new(100).unwrap();

// =============================================================================
// BUCKETS
// =============================================================================

/// Which quota bucket a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// One bucket per wizard application.
    Application(u64),
    /// Registry-level routes without an application id.
    Shared,
}

/// Map a request path to its quota bucket.
///
/// Anything shaped `/applications/{id}...` with a numeric id lands in
/// that application's bucket; everything else is shared.
fn bucket_for_path(path: &str) -> RateKey {
    let Some(rest) = path.strip_prefix("/applications/") else {
        return RateKey::Shared;
    };
    let id_segment = rest.split('/').next().unwrap_or_default();
    match id_segment.parse::<u64>() {
        Ok(id) => RateKey::Application(id),
        Err(_) => RateKey::Shared,
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Keyed rate limiter shared across requests.
pub type ApiRateLimiter = Arc<RateLimiter<RateKey, DefaultKeyedStateStore<RateKey>, DefaultClock>>;

/// Create a keyed rate limiter with the given per-bucket quota.
pub fn create_rate_limiter(requests_per_second: u32) -> ApiRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::keyed(Quota::per_second(rps)))
}

/// Get rate limit from environment variable.
///
/// Returns the value of `TRELLIS_RATE_LIMIT` or 100 if not set.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("TRELLIS_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

/// Rate limiting middleware.
///
/// Draws one cell from the request's bucket; an exhausted bucket answers
/// 429 with the API's standard response envelope.
pub async fn rate_limit_middleware(
    State(limiter): State<ApiRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<RejectionResponse>)> {
    let key = bucket_for_path(request.uri().path());

    if limiter.check_key(&key).is_ok() {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(bucket = ?key, "Rate limit exceeded");
        Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(RejectionResponse::error("Too many requests")),
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
