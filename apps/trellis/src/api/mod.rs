//! # Trellis HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Application store status
//! - `POST /applications` - Create a new wizard application
//! - `GET /applications` - List application identifiers
//! - `GET /applications/{id}` - Wizard state for one application
//! - `DELETE /applications/{id}` - Remove an application
//! - `PUT /applications/{id}/fields` - Set a field value
//! - `DELETE /applications/{id}/fields` - Clear a field value
//! - `POST /applications/{id}/uploads` - Attach a document to an upload field
//! - `POST /applications/{id}/save` - Commit a stage payload
//! - `POST /applications/{id}/next` - Advance the wizard
//! - `POST /applications/{id}/goto` - Jump to a stage
//! - `GET /applications/{id}/export` - Canonical export
//! - `GET /reference/{set}` - Reference data list
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `TRELLIS_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `TRELLIS_RATE_LIMIT`: Requests per second per application bucket (default: 100, 0 to disable)
//! - `TRELLIS_API_KEY`: If set, requires Bearer token authentication
//!   (`/health` and `GET /reference/{set}` stay public)

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `trellis::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    clear_field_handler, create_handler, delete_handler, export_handler, goto_handler,
    health_handler, list_handler, next_handler, reference_handler, save_handler,
    set_field_handler, show_handler, status_handler, upload_handler,
};
#[allow(unused_imports)]
pub use types::{
    ApplicationStateResponse, ClearFieldRequest, CreatedResponse, DeletedResponse, ExportResponse,
    FieldResponse, HealthResponse, ListResponse, NavigateRequest, NavigateResponse,
    NotificationJson, ReferenceItemJson, ReferenceResponse, RejectionResponse, SaveRequest,
    SaveResponse, SetFieldRequest, StageStateJson, StatusResponse, UploadRequest, UploadResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use trellis_core::{ApplicationStore, DigestFileStore, TrellisError};

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the application store.
#[derive(Clone)]
pub struct AppState {
    /// The store holding all wizard applications.
    pub store: Arc<RwLock<ApplicationStore>>,
    /// Content-addressed document store; stateless, shared by copy.
    pub files: DigestFileStore,
}

impl AppState {
    /// Create new app state around a store.
    #[must_use]
    pub fn new(store: ApplicationStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            files: DigestFileStore,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `TRELLIS_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
///
/// # Security Note
///
/// The default is restrictive (localhost only). Set `TRELLIS_CORS_ORIGINS=*`
/// explicitly only for development or if you understand the security implications.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("TRELLIS_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            // Explicit wildcard - warn about security implications
            tracing::warn!(
                "CORS: Allowing ALL origins (TRELLIS_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            // Parse comma-separated origins
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in TRELLIS_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            // No configuration - default to localhost only (restrictive)
            tracing::info!("CORS: No TRELLIS_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - caps request payloads
/// 4. Rate Limiting - per-application quota buckets (if enabled)
/// 5. Authentication - validates API key; /health and the reference
///    catalog stay public (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    // Check if rate limiting is enabled
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second per application bucket",
            rate_limit
        );
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    // Check if authentication is enabled
    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "⚠️  API key authentication DISABLED - all endpoints are publicly accessible! \
             Set TRELLIS_API_KEY environment variable to enable authentication."
        );
    }

    // Build base router with routes
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/applications",
            get(handlers::list_handler).post(handlers::create_handler),
        )
        .route(
            "/applications/{id}",
            get(handlers::show_handler).delete(handlers::delete_handler),
        )
        .route(
            "/applications/{id}/fields",
            put(handlers::set_field_handler).delete(handlers::clear_field_handler),
        )
        .route("/applications/{id}/uploads", post(handlers::upload_handler))
        .route("/applications/{id}/save", post(handlers::save_handler))
        .route("/applications/{id}/next", post(handlers::next_handler))
        .route("/applications/{id}/goto", post(handlers::goto_handler))
        .route("/applications/{id}/export", get(handlers::export_handler))
        .route("/reference/{set}", get(handlers::reference_handler));

    // Apply authentication middleware (innermost - runs last on request)
    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    // Apply rate limiting middleware
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Apply tracing, CORS, and body limit (outermost layers first)
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, store: ApplicationStore) -> Result<(), TrellisError> {
    let state = AppState::new(store);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TrellisError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Trellis HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| TrellisError::IoError(format!("Server error: {}", e)))
}
