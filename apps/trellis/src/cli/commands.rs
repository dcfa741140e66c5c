//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use serde::Deserialize;
use std::path::PathBuf;
use trellis_core::{
    ALL_REFERENCE_SETS, ApplicationId, ApplicationStore, CompletionEvent, CompletionTransition,
    DigestFileStore, FieldName, FieldValue, FileStore, NavigationOutcome, Notification, Notifier,
    ReferenceSet, ReferenceSource, SEQUENCE, SaveOutcome, Stage, StageBridge, StagePayload,
    StaticReference, SubFormId, TrellisError, UploadState, WizardPosition, WizardSession,
    export::{canonical_checksum, export_canonical, import_canonical},
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for document uploads (20 MB).
///
/// Issuance documents are attachments, not bulk data.
const MAX_UPLOAD_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Maximum file size for stage payload files (1 MB).
///
/// Payloads are small JSON documents.
const MAX_PAYLOAD_FILE_SIZE: u64 = 1024 * 1024;

/// Maximum file size for import (32 MB).
///
/// Canonical exports are compact; the decoder enforces a tighter cap
/// on the decoded payload.
const MAX_IMPORT_FILE_SIZE: u64 = 32 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &PathBuf, max_size: u64) -> Result<(), TrellisError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TrellisError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TrellisError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate file path for security.
///
/// This function:
/// 1. Canonicalizes the path to resolve symlinks and ".."
/// 2. Ensures the path exists
/// 3. Ensures the path is a file (not a directory)
///
/// # Security Note
///
/// This prevents path traversal attacks where a malicious path like
/// "../../../etc/passwd" could be used to access sensitive files.
fn validate_file_path(path: &std::path::Path) -> Result<PathBuf, TrellisError> {
    // Canonicalize resolves "..", symlinks, and validates existence
    let canonical = path.canonicalize().map_err(|e| {
        TrellisError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    // Ensure it's a file, not a directory
    if !canonical.is_file() {
        return Err(TrellisError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate output path for security.
///
/// For output files, we validate the parent directory exists and is writable.
fn validate_output_path(path: &std::path::Path) -> Result<PathBuf, TrellisError> {
    // Get parent directory
    let parent = path.parent().unwrap_or(std::path::Path::new("."));

    // Canonicalize parent to resolve ".." and symlinks
    let canonical_parent = parent.canonicalize().map_err(|e| {
        TrellisError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    // Ensure parent is a directory
    if !canonical_parent.is_dir() {
        return Err(TrellisError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    // Return the path with canonical parent + original filename
    let filename = path
        .file_name()
        .ok_or_else(|| TrellisError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// SERVER CONFIGURATION
// =============================================================================

/// Default bind host when neither flag nor config file provides one.
const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port when neither flag nor config file provides one.
const DEFAULT_PORT: u16 = 8080;

/// `[server]` settings read from a TOML config file.
///
/// CLI flags take precedence over the file, the file over built-in
/// defaults.
#[derive(Debug, Default, Deserialize)]
struct ServerConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
}

impl ServerConfig {
    /// Read settings from an explicit config file path.
    fn from_file(path: &std::path::Path) -> Result<Self, TrellisError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrellisError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let file: ConfigFile = toml::from_str(&text)
            .map_err(|e| TrellisError::SerializationError(format!("Parse config: {}", e)))?;
        Ok(file.server)
    }

    /// Look for `trellis.toml` in the working directory.
    fn discover() -> Self {
        let path = std::path::Path::new("trellis.toml");
        if path.is_file() {
            Self::from_file(path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring trellis.toml: {}", e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &PathBuf,
    backend: &str,
    host: Option<String>,
    port: Option<u16>,
    config: Option<&std::path::Path>,
) -> Result<(), TrellisError> {
    let file_config = match config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::discover(),
    };
    let host = host
        .or(file_config.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = port.or(file_config.port).unwrap_or(DEFAULT_PORT);

    let store = load_store(db_path, backend)?;

    println!("Trellis Bond Issuance Wizard Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  GET    /health                    - Health check");
    println!("  GET    /status                    - Store status");
    println!("  POST   /applications              - Create application");
    println!("  GET    /applications/{{id}}         - Wizard state");
    println!("  PUT    /applications/{{id}}/fields  - Set a field");
    println!("  POST   /applications/{{id}}/uploads - Attach a document");
    println!("  POST   /applications/{{id}}/save    - Commit a stage payload");
    println!("  POST   /applications/{{id}}/next    - Advance the wizard");
    println!("  POST   /applications/{{id}}/goto    - Jump to a stage");
    println!("  GET    /applications/{{id}}/export  - Canonical export");
    println!("  GET    /reference/{{set}}           - Reference data");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, store).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show application store status.
pub fn cmd_status(db_path: &PathBuf, backend: &str, json_mode: bool) -> Result<(), TrellisError> {
    let store = load_store(db_path, backend)?;
    let applications = store.list()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "application_count": applications.len(),
            "applications": applications.iter().map(|id| id.0).collect::<Vec<_>>(),
            "persistent": store.is_persistent()
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Trellis Store Status");
    println!("====================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend);
    println!();
    println!("Applications: {}", applications.len());
    for id in &applications {
        println!("  #{}", id.0);
    }

    Ok(())
}

// =============================================================================
// NEW COMMAND
// =============================================================================

/// Create a new wizard application.
pub fn cmd_new(db_path: &PathBuf, backend: &str, json_mode: bool) -> Result<(), TrellisError> {
    let mut store = load_store(db_path, backend)?;
    let id = store.create()?;

    if json_mode {
        let output = serde_json::json!({ "application_id": id.0 });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Created application #{}", id.0);
    println!("Inspect it with: trellis show -a {}", id.0);

    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show wizard state for an application.
pub fn cmd_show(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
    detailed: bool,
) -> Result<(), TrellisError> {
    let store = load_store(db_path, backend)?;
    let session = load_application(&store, application)?;
    let state = session.state();

    if json_mode {
        let output = serde_json::json!({
            "application_id": application,
            "state": state,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Trellis Wizard State");
    println!("====================");
    println!("Application: #{}", application);
    match state.position {
        WizardPosition::Active { stage } => println!("Position:    {}", stage),
        WizardPosition::Submitted => println!("Position:    Submitted"),
    }
    println!(
        "Overall:     {}.{:02}%",
        state.overall_basis_points / 100,
        state.overall_basis_points % 100
    );
    println!();
    println!("Stages:");

    for stage in SEQUENCE {
        let signal = session.progress().signal(stage);
        let marker = if signal.complete { "[x]" } else { "[ ]" };
        let committed = if session.is_committed(stage) {
            "  (committed)"
        } else {
            ""
        };
        println!(
            "  {} {:<28} {:>3}.{:02}%{}",
            marker,
            stage.to_string(),
            signal.basis_points / 100,
            signal.basis_points % 100,
            committed
        );
    }

    if detailed {
        println!();
        println!("Sub-forms:");
        for stage in SEQUENCE {
            println!("  {}", stage);
            for plan in stage.blueprint() {
                let subform = SubFormId::new(plan.id);
                let (filled, total) = session
                    .form(stage, &subform)
                    .map_or((0, plan.required.len()), |form| {
                        (form.filled_count(), form.required_count())
                    });
                println!(
                    "    {:<24} weight {:>6} bp   {}/{} required fields",
                    plan.id, plan.weight_bp, filled, total
                );
                if let Some(form) = session.form(stage, &subform) {
                    for (name, value) in form.iter() {
                        println!("      {} = {}", name.as_str(), describe_value(value));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Human-readable rendering of one field value.
fn describe_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Empty => "(empty)".to_string(),
        FieldValue::Text { value } => value.clone(),
        FieldValue::Number { value } => value.to_string(),
        FieldValue::Flag { value } => value.to_string(),
        FieldValue::List { values } => format!("[{}]", values.join(", ")),
        FieldValue::Record { entries } => format!("{{{} entries}}", entries.len()),
        FieldValue::Upload { state } => match state {
            UploadState::InFlight { original_name } => format!("uploading {}", original_name),
            UploadState::Uploaded { file } => format!("{} ({})", file.original_name, file.file_id),
            UploadState::Failed { message } => format!("upload failed: {}", message),
        },
    }
}

// =============================================================================
// SET COMMAND
// =============================================================================

/// Set a field value on a stage.
#[allow(clippy::too_many_arguments)]
pub fn cmd_set(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
    stage: &str,
    subform: Option<&str>,
    field: &str,
    value: &str,
    kind: &str,
) -> Result<(), TrellisError> {
    let stage = parse_stage(stage)?;
    let subform = resolve_subform(stage, subform, field)?;
    let parsed = parse_value(value, kind)?;

    let mut store = load_store(db_path, backend)?;
    let mut session = load_application(&store, application)?;

    let event = session.set_field(stage, &subform, FieldName::new(field), parsed)?;
    store.save_snapshot(ApplicationId(application), &session.snapshot())?;

    let signal = session.progress().signal(stage);

    if json_mode {
        let output = serde_json::json!({
            "application_id": application,
            "stage": stage.name(),
            "sub_form": subform.as_str(),
            "field": field,
            "stage_basis_points": signal.basis_points,
            "stage_complete": signal.complete,
            "event": event,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Set {} on {} ({}.{:02}% of stage)",
        field,
        stage,
        signal.basis_points / 100,
        signal.basis_points % 100
    );
    announce_event(event);

    Ok(())
}

/// Parse a CLI value string into a typed field value.
fn parse_value(value: &str, kind: &str) -> Result<FieldValue, TrellisError> {
    match kind {
        "text" => Ok(FieldValue::text(value)),
        "number" => value
            .trim()
            .parse::<i64>()
            .map(FieldValue::number)
            .map_err(|_| TrellisError::Validation(format!("Not a number: '{}'", value))),
        "flag" => match value.trim() {
            "true" | "yes" | "1" => Ok(FieldValue::flag(true)),
            "false" | "no" | "0" => Ok(FieldValue::flag(false)),
            other => Err(TrellisError::Validation(format!("Not a flag: '{}'", other))),
        },
        "list" => Ok(FieldValue::list(
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        )),
        _ => Err(TrellisError::Validation(format!(
            "Unknown value kind: {}. Use: text, number, flag, list",
            kind
        ))),
    }
}

// =============================================================================
// CLEAR COMMAND
// =============================================================================

/// Clear a field value.
pub fn cmd_clear(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
    stage: &str,
    subform: Option<&str>,
    field: &str,
) -> Result<(), TrellisError> {
    let stage = parse_stage(stage)?;
    let subform = resolve_subform(stage, subform, field)?;

    let mut store = load_store(db_path, backend)?;
    let mut session = load_application(&store, application)?;

    let event = session.clear_field(stage, &subform, &FieldName::new(field))?;
    store.save_snapshot(ApplicationId(application), &session.snapshot())?;

    let signal = session.progress().signal(stage);

    if json_mode {
        let output = serde_json::json!({
            "application_id": application,
            "stage": stage.name(),
            "sub_form": subform.as_str(),
            "field": field,
            "stage_basis_points": signal.basis_points,
            "stage_complete": signal.complete,
            "event": event,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Cleared {} on {} ({}.{:02}% of stage)",
        field,
        stage,
        signal.basis_points / 100,
        signal.basis_points % 100
    );
    announce_event(event);

    Ok(())
}

// =============================================================================
// UPLOAD COMMAND
// =============================================================================

/// Attach a document to an upload field.
#[allow(clippy::too_many_arguments)]
pub fn cmd_upload(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
    stage: &str,
    subform: Option<&str>,
    field: &str,
    file: &PathBuf,
) -> Result<(), TrellisError> {
    let stage = parse_stage(stage)?;
    let subform = resolve_subform(stage, subform, field)?;
    let field_name = FieldName::new(field);

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_UPLOAD_FILE_SIZE)?;

    let content = std::fs::read(&validated_path)
        .map_err(|e| TrellisError::IoError(format!("Read file: {}", e)))?;
    let original_name = validated_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let mut store = load_store(db_path, backend)?;
    let mut session = load_application(&store, application)?;

    // Mark the field in-flight, then hand content to the file store.
    session.begin_upload(stage, &subform, field_name.clone(), original_name.clone())?;

    let mut files = DigestFileStore;
    match files.upload(&original_name, &content) {
        Ok(file_ref) => {
            let event = session.resolve_upload(stage, &subform, &field_name, file_ref.clone())?;
            store.save_snapshot(ApplicationId(application), &session.snapshot())?;

            let signal = session.progress().signal(stage);

            if json_mode {
                let output = serde_json::json!({
                    "application_id": application,
                    "file_id": file_ref.file_id,
                    "url": file_ref.url,
                    "original_name": file_ref.original_name,
                    "stage_basis_points": signal.basis_points,
                    "stage_complete": signal.complete,
                    "event": event,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_default()
                );
                return Ok(());
            }

            println!("Uploaded {} as {}", original_name, file_ref.file_id);
            println!(
                "{} now at {}.{:02}%",
                stage,
                signal.basis_points / 100,
                signal.basis_points % 100
            );
            announce_event(event);
            Ok(())
        }
        Err(e) => {
            // The field keeps a failed marker so a retry is possible.
            session.fail_upload(stage, &subform, &field_name, e.to_string())?;
            store.save_snapshot(ApplicationId(application), &session.snapshot())?;
            Err(e)
        }
    }
}

// =============================================================================
// SAVE COMMAND
// =============================================================================

/// Commit a stage payload from a JSON file.
pub fn cmd_save(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
    file: &PathBuf,
) -> Result<(), TrellisError> {
    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_PAYLOAD_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| TrellisError::IoError(format!("Read file: {}", e)))?;
    let payload: StagePayload = serde_json::from_slice(&contents)
        .map_err(|e| TrellisError::DeserializationError(format!("Parse payload: {}", e)))?;

    let mut store = load_store(db_path, backend)?;
    let mut session = load_application(&store, application)?;

    let outcome = StageBridge::save_with(
        &mut session,
        &mut store,
        ApplicationId(application),
        &payload,
    )?;
    store.save_snapshot(ApplicationId(application), &session.snapshot())?;

    match outcome {
        SaveOutcome::Committed {
            stage,
            message,
            event,
        } => {
            if json_mode {
                let output = serde_json::json!({
                    "application_id": application,
                    "outcome": "committed",
                    "stage": stage.name(),
                    "message": message,
                    "event": event,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_default()
                );
                return Ok(());
            }

            println!("Committed {}: {}", stage, message);
            announce_event(event);
            Ok(())
        }
        SaveOutcome::Failed { stage, error } => {
            println!("Save failed for {}: {}", stage, error);
            Err(error)
        }
        SaveOutcome::Stale { stage } => {
            println!("Save for {} was superseded; result discarded", stage);
            Ok(())
        }
    }
}

// =============================================================================
// NAVIGATION COMMANDS
// =============================================================================

/// Advance the wizard to the next stage.
pub fn cmd_next(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
) -> Result<(), TrellisError> {
    let mut store = load_store(db_path, backend)?;
    let mut session = load_application(&store, application)?;

    let outcome = session.go_next();
    if !outcome.is_denied() {
        store.save_snapshot(ApplicationId(application), &session.snapshot())?;
    }

    report_navigation(json_mode, application, &outcome);
    Ok(())
}

/// Jump to a specific stage.
pub fn cmd_goto(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    application: u64,
    stage: &str,
) -> Result<(), TrellisError> {
    let target = parse_stage(stage)?;

    let mut store = load_store(db_path, backend)?;
    let mut session = load_application(&store, application)?;

    let outcome = session.go_to(target);
    if !outcome.is_denied() {
        store.save_snapshot(ApplicationId(application), &session.snapshot())?;
    }

    report_navigation(json_mode, application, &outcome);
    Ok(())
}

/// Print a navigation outcome, routing its notification to the console.
fn report_navigation(json_mode: bool, application: u64, outcome: &NavigationOutcome) {
    if json_mode {
        let output = serde_json::json!({
            "application_id": application,
            "result": outcome,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return;
    }

    match outcome {
        NavigationOutcome::Moved { from, to } => {
            println!("Moved from {} to {}", from, to);
        }
        NavigationOutcome::Submitted { from } => {
            println!("Advanced past {}", from);
        }
        NavigationOutcome::Denied { .. } => {}
    }

    if let Some(notification) = outcome.notification() {
        ConsoleNotifier.notify(notification);
    }
}

/// Notifier that prints `[severity] message` lines to stderr.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!(
            "[{}] {}",
            notification.severity.as_str(),
            notification.message
        );
    }
}

/// Print a completion event, if one fired.
fn announce_event(event: Option<CompletionEvent>) {
    if let Some(e) = event {
        match e.transition {
            CompletionTransition::Completed => println!("{} is now complete", e.stage),
            CompletionTransition::Reopened => println!("{} is no longer complete", e.stage),
        }
    }
}

// =============================================================================
// REFS COMMAND
// =============================================================================

/// List reference data sets.
pub fn cmd_refs(json_mode: bool, set: Option<&str>) -> Result<(), TrellisError> {
    let source = StaticReference;

    match set {
        Some(name) => {
            let set = ReferenceSet::parse(name)
                .ok_or_else(|| TrellisError::UnknownReferenceSet(name.to_string()))?;
            let items = source.fetch(set)?;

            if json_mode {
                let output = serde_json::json!({
                    "set": set.name(),
                    "items": items,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_default()
                );
                return Ok(());
            }

            println!("Reference set: {}", set.name());
            for item in &items {
                println!("  {:<20} {}", item.code, item.label);
            }
        }
        None => {
            if json_mode {
                let output = serde_json::json!({
                    "sets": ALL_REFERENCE_SETS.iter().map(|s| s.name()).collect::<Vec<_>>(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_default()
                );
                return Ok(());
            }

            println!("Reference sets:");
            for set in ALL_REFERENCE_SETS {
                println!("  {}", set.name());
            }
        }
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export an application in canonical format.
pub fn cmd_export(
    db_path: &PathBuf,
    backend: &str,
    application: u64,
    output: &std::path::Path,
    format: &str,
) -> Result<(), TrellisError> {
    let validated_output = validate_output_path(output)?;

    let store = load_store(db_path, backend)?;
    let id = ApplicationId(application);
    let snapshot = store
        .load(id)?
        .ok_or(TrellisError::ApplicationNotFound(id))?;

    let data = match format {
        "canonical" => {
            let data = export_canonical(id, &snapshot)?;
            let checksum = canonical_checksum(&data);
            println!("Checksum: {}", checksum);
            data
        }
        "json" => serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| TrellisError::SerializationError(e.to_string()))?,
        _ => {
            return Err(TrellisError::Validation(format!(
                "Unknown format: {}. Use: canonical, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| TrellisError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import an application from canonical format.
///
/// The imported snapshot always lands under a freshly allocated
/// identifier so an import can never overwrite an existing application.
pub fn cmd_import(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    input: &std::path::Path,
) -> Result<(), TrellisError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| TrellisError::IoError(format!("Read file: {}", e)))?;

    let (source_id, snapshot) = import_canonical(&data)?;

    let mut store = load_store(db_path, backend)?;
    let id = store.create()?;
    store.save_snapshot(id, &snapshot)?;

    let session = WizardSession::from_snapshot(snapshot);
    let state = session.state();

    if json_mode {
        let output = serde_json::json!({
            "application_id": id.0,
            "source_application_id": source_id.0,
            "overall_basis_points": state.overall_basis_points,
            "committed_stages": state.committed.iter().map(|s| s.name()).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Imported application #{} (exported as #{})",
        id.0, source_id.0
    );
    println!(
        "Overall completion: {}.{:02}%",
        state.overall_basis_points / 100,
        state.overall_basis_points % 100
    );

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(db_path: &PathBuf, backend: &str, force: bool) -> Result<(), TrellisError> {
    if db_path.exists() && !force {
        return Err(TrellisError::Validation(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    match backend {
        "redb" => {
            if force && db_path.exists() {
                std::fs::remove_file(db_path)
                    .map_err(|e| TrellisError::IoError(format!("Remove database: {}", e)))?;
            }
            let _store = ApplicationStore::with_redb(db_path)?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        "memory" => {
            println!("Memory backend needs no initialization");
        }
        _ => {
            return Err(TrellisError::Validation(format!(
                "Unknown backend: {}. Use: redb, memory",
                backend
            )));
        }
    }

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the application store for the selected backend.
pub fn load_store(db_path: &PathBuf, backend: &str) -> Result<ApplicationStore, TrellisError> {
    match backend {
        "redb" => ApplicationStore::with_redb(db_path),
        "memory" => Ok(ApplicationStore::in_memory()),
        _ => Err(TrellisError::Validation(format!(
            "Unknown backend: {}. Use: redb, memory",
            backend
        ))),
    }
}

/// Load one application into a live wizard session.
pub fn load_application(
    store: &ApplicationStore,
    application: u64,
) -> Result<WizardSession, TrellisError> {
    let id = ApplicationId(application);
    let snapshot = store
        .load(id)?
        .ok_or(TrellisError::ApplicationNotFound(id))?;
    Ok(WizardSession::from_snapshot(snapshot))
}

/// Parse a stage name, mapping failure to a typed error.
fn parse_stage(name: &str) -> Result<Stage, TrellisError> {
    Stage::parse(name).ok_or_else(|| TrellisError::UnknownStage(name.to_string()))
}

/// Resolve the sub-form for a field, consulting the stage blueprint
/// when the caller did not name one.
fn resolve_subform(
    stage: Stage,
    subform: Option<&str>,
    field: &str,
) -> Result<SubFormId, TrellisError> {
    match subform {
        Some(id) => Ok(SubFormId::new(id)),
        None => stage
            .subform_for_field(field)
            .map(SubFormId::new)
            .ok_or_else(|| {
                TrellisError::Validation(format!(
                    "Field '{}' is not in the {} blueprint; pass --subform explicitly",
                    field,
                    stage.name()
                ))
            }),
    }
}
