//! # Trellis - Bond Issuance Wizard
//!
//! The main binary for the Trellis multi-step issuance wizard.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for wizard operations
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │              apps/trellis (THE BINARY)            │
//! │                                                   │
//! │  ┌─────────────┐          ┌─────────────┐         │
//! │  │   CLI       │          │   HTTP API  │         │
//! │  │  (clap)     │          │   (axum)    │         │
//! │  └──────┬──────┘          └──────┬──────┘         │
//! │         │                        │                │
//! │         └──────────┬─────────────┘                │
//! │                    ▼                              │
//! │            ┌───────────────┐                      │
//! │            │ trellis-core  │                      │
//! │            │ (THE ENGINE)  │                      │
//! │            └───────────────┘                      │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! trellis server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! trellis status
//! trellis new
//! trellis set -a 1 -s fund_position -f fund_name --value "Meridian Credit Fund"
//! trellis next -a 1
//! ```

mod api;
mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — TRELLIS_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TRELLIS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trellis=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Trellis startup banner.
fn print_banner() {
    println!(
        r#"
  ████████╗██████╗ ███████╗██╗     ██╗     ██╗███████╗
  ╚══██╔══╝██╔══██╗██╔════╝██║     ██║     ██║██╔════╝
     ██║   ██████╔╝█████╗  ██║     ██║     ██║███████╗
     ██║   ██╔══██╗██╔══╝  ██║     ██║     ██║╚════██║
     ██║   ██║  ██║███████╗███████╗███████╗██║███████║
     ╚═╝   ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝╚═╝╚══════╝

  Bond Issuance Wizard v{}

  Stepwise • Weighted • Auditable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
