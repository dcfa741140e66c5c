//! # API Key Authentication
//!
//! Bearer-token authentication for the wizard API.
//!
//! When `TRELLIS_API_KEY` is set, every endpoint that can read or mutate
//! application state requires `Authorization: Bearer <key>` (a raw key
//! without the prefix is also accepted). Two read-only surfaces stay
//! public: `/health`, so load balancers can probe without credentials,
//! and the `GET /reference/{set}` catalog, which serves static issuance
//! vocabulary (charge types, rating agencies, depositories) and never
//! touches applicant data.
//!
//! Unset or empty `TRELLIS_API_KEY` disables authentication entirely.

use axum::{
    Json,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::types::RejectionResponse;

/// Endpoints that answer without credentials even when a key is set.
///
/// Everything under `/applications` carries applicant data and is
/// deliberately absent here; exports in particular are read-only but
/// must stay authenticated.
const PUBLIC_GET_PATHS: &[&str] = &["/health"];

/// Public path prefixes, GET only.
const PUBLIC_GET_PREFIXES: &[&str] = &["/reference/"];

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Get API key from environment variable.
///
/// Returns `Some(key)` if `TRELLIS_API_KEY` is set and non-empty,
/// `None` otherwise (disabling authentication).
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("TRELLIS_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Whether a request may bypass authentication.
fn is_public(method: &Method, path: &str) -> bool {
    if *method != Method::GET {
        return false;
    }
    PUBLIC_GET_PATHS.contains(&path)
        || PUBLIC_GET_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

/// Constant-time credential comparison.
///
/// Both sides are padded to a common length so `ct_eq` always walks the
/// same number of bytes; the length check happens after the scan so a
/// short guess costs the same as a near miss.
fn credentials_match(provided: &[u8], expected: &[u8]) -> bool {
    let width = provided.len().max(expected.len());
    let mut lhs = vec![0u8; width];
    let mut rhs = vec![0u8; width];
    lhs[..provided.len()].copy_from_slice(provided);
    rhs[..expected.len()].copy_from_slice(expected);

    let bytes_equal: bool = lhs.ct_eq(&rhs).into();
    bytes_equal && provided.len() == expected.len()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Rejection carrying the API's standard response envelope.
fn unauthorized() -> (StatusCode, Json<RejectionResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(RejectionResponse::error("Unauthorized")),
    )
}

/// API key authentication middleware.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<RejectionResponse>)> {
    // No key configured means an open server.
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if is_public(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(header_value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            path = %request.uri().path(),
            "Missing Authorization header"
        );
        return Err(unauthorized());
    };

    // Accept "Bearer <key>" and a raw "<key>".
    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);

    if credentials_match(provided.as_bytes(), expected.as_bytes()) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            path = %request.uri().path(),
            "Authentication failed: invalid API key"
        );
        Err(unauthorized())
    }
}

// =============================================================================
// TESTS
// =============================================================================
