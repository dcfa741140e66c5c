//! # Trellis CLI Module
//!
//! This module implements the CLI interface for Trellis.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show application store status
//! - `new` - Create a new wizard application
//! - `show` - Show wizard state for an application
//! - `set` - Set a field value on a stage
//! - `clear` - Clear a field value
//! - `upload` - Attach a document to an upload field
//! - `save` - Commit a stage payload from a JSON file
//! - `next` - Advance the wizard to the next stage
//! - `goto` - Jump to a specific stage
//! - `refs` - List reference data sets
//! - `export` - Export an application in canonical format
//! - `import` - Import an application from canonical format
//! - `init` - Initialize new database

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trellis_core::TrellisError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trellis - Bond Issuance Wizard
///
/// A five-stage issuance wizard with weighted completion tracking.
/// Progress is derived entirely from the field values each stage holds.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the application database
    #[arg(short = 'D', long, global = true, default_value = "trellis.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to a TOML config file with [server] settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show application store status
    Status,

    /// Create a new wizard application
    New,

    /// Show wizard state for an application
    Show {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Show per-subform field breakdown
        #[arg(short, long)]
        detailed: bool,
    },

    /// Set a field value on a stage
    Set {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Stage name (e.g. fund_position)
        #[arg(short, long)]
        stage: String,

        /// Sub-form name (resolved from the stage blueprint when omitted)
        #[arg(long)]
        subform: Option<String>,

        /// Field name
        #[arg(short, long)]
        field: String,

        /// Field value
        #[arg(long)]
        value: String,

        /// Value kind (text, number, flag, list)
        #[arg(short = 't', long, default_value = "text")]
        kind: String,
    },

    /// Clear a field value
    Clear {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Stage name
        #[arg(short, long)]
        stage: String,

        /// Sub-form name (resolved from the stage blueprint when omitted)
        #[arg(long)]
        subform: Option<String>,

        /// Field name
        #[arg(short, long)]
        field: String,
    },

    /// Attach a document to an upload field
    Upload {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Stage name
        #[arg(short, long)]
        stage: String,

        /// Sub-form name (resolved from the stage blueprint when omitted)
        #[arg(long)]
        subform: Option<String>,

        /// Field name
        #[arg(short, long)]
        field: String,

        /// Path to the document to upload
        #[arg(long)]
        file: PathBuf,
    },

    /// Commit a stage payload from a JSON file
    Save {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Path to a JSON stage payload
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Advance the wizard to the next stage
    Next {
        /// Application ID
        #[arg(short, long)]
        application: u64,
    },

    /// Jump to a specific stage
    Goto {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Target stage name
        #[arg(short, long)]
        stage: String,
    },

    /// List reference data sets
    Refs {
        /// Reference set name (lists all sets when omitted)
        #[arg(short, long)]
        set: Option<String>,
    },

    /// Export an application in canonical format
    Export {
        /// Application ID
        #[arg(short, long)]
        application: u64,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (canonical, json)
        #[arg(short = 't', long, default_value = "canonical")]
        format: String,
    },

    /// Import an application from canonical format
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TrellisError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port, config }) => {
            cmd_server(&cli.database, backend, host, port, config.as_deref()).await
        }
        Some(Commands::Status) => cmd_status(&cli.database, backend, json_mode),
        Some(Commands::New) => cmd_new(&cli.database, backend, json_mode),
        Some(Commands::Show {
            application,
            detailed,
        }) => cmd_show(&cli.database, backend, json_mode, application, detailed),
        Some(Commands::Set {
            application,
            stage,
            subform,
            field,
            value,
            kind,
        }) => cmd_set(
            &cli.database,
            backend,
            json_mode,
            application,
            &stage,
            subform.as_deref(),
            &field,
            &value,
            &kind,
        ),
        Some(Commands::Clear {
            application,
            stage,
            subform,
            field,
        }) => cmd_clear(
            &cli.database,
            backend,
            json_mode,
            application,
            &stage,
            subform.as_deref(),
            &field,
        ),
        Some(Commands::Upload {
            application,
            stage,
            subform,
            field,
            file,
        }) => cmd_upload(
            &cli.database,
            backend,
            json_mode,
            application,
            &stage,
            subform.as_deref(),
            &field,
            &file,
        ),
        Some(Commands::Save { application, file }) => {
            cmd_save(&cli.database, backend, json_mode, application, &file)
        }
        Some(Commands::Next { application }) => {
            cmd_next(&cli.database, backend, json_mode, application)
        }
        Some(Commands::Goto { application, stage }) => {
            cmd_goto(&cli.database, backend, json_mode, application, &stage)
        }
        Some(Commands::Refs { set }) => cmd_refs(json_mode, set.as_deref()),
        Some(Commands::Export {
            application,
            output,
            format,
        }) => cmd_export(&cli.database, backend, application, &output, &format),
        Some(Commands::Import { input }) => cmd_import(&cli.database, backend, json_mode, &input),
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, json_mode)
        }
    }
}
