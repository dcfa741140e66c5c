//! # Trellis MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to Trellis.
//!
//! Reads configuration from environment variables:
//! - `TRELLIS_URL` — Trellis server URL (default: `http://localhost:8080`)
//! - `TRELLIS_API_KEY` — Optional Bearer token for authentication
//!
//! Communicates with AI clients (Claude, GPT) via MCP over stdio,
//! and forwards requests to the Trellis HTTP API.

mod client;
mod server;

use client::TrellisClient;
use rmcp::{ServiceExt, transport::stdio};
use server::TrellisMcp;

/// Where the wizard server lives when `TRELLIS_URL` is unset.
const DEFAULT_URL: &str = "http://localhost:8080";

/// Bridge configuration, read once at startup.
struct BridgeConfig {
    url: String,
    api_key: Option<String>,
}

impl BridgeConfig {
    /// An empty `TRELLIS_API_KEY` counts as unset, matching the server's
    /// own reading of the variable.
    fn from_env() -> Self {
        Self {
            url: std::env::var("TRELLIS_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            api_key: std::env::var("TRELLIS_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP stdio transport; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis_mcp=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = BridgeConfig::from_env();
    tracing::info!(
        url = %config.url,
        authenticated = config.api_key.is_some(),
        "Trellis MCP bridge starting"
    );

    let client = TrellisClient::new(config.url.clone(), config.api_key);

    // Probe the wizard server once so a misconfigured URL or missing key
    // shows up in the logs immediately. Not fatal: the server may come up
    // after the bridge.
    match client.health().await {
        Ok(_) => tracing::info!("Trellis server reachable at {}", config.url),
        Err(e) => tracing::warn!("Trellis server not reachable yet: {}", e),
    }

    let service = TrellisMcp::new(client)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("MCP serve error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
