//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Handlers work on one application at a time: load the snapshot into
//! a live session, apply the operation, persist the new snapshot. A
//! denied navigation is an ordinary 200 response, never an error.

use super::{
    AppState,
    types::{
        ApplicationStateResponse, ClearFieldRequest, CreatedResponse, DeletedResponse,
        ExportResponse, FieldResponse, HealthResponse, ListResponse, NavigateRequest,
        NavigateResponse, ReferenceResponse, SaveRequest, SaveResponse, SetFieldRequest,
        StatusResponse, UploadRequest, UploadResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use trellis_core::{
    ApplicationId, ApplicationStore, CompletionTransition, FileStore, ReferenceSet,
    ReferenceSource, SaveOutcome, Stage, StageBridge, StaticReference, TrellisError, WizardSession,
    export::{canonical_checksum, export_canonical},
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Map a core error to the HTTP status of its response.
fn error_status(error: &TrellisError) -> StatusCode {
    match error {
        TrellisError::ApplicationNotFound(_) | TrellisError::UnknownReferenceSet(_) => {
            StatusCode::NOT_FOUND
        }
        TrellisError::Validation(_)
        | TrellisError::Upload(_)
        | TrellisError::UnknownStage(_)
        | TrellisError::DeserializationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Load one application's snapshot into a live session.
fn load_session(
    store: &ApplicationStore,
    application: ApplicationId,
) -> Result<WizardSession, TrellisError> {
    let snapshot = store
        .load(application)?
        .ok_or(TrellisError::ApplicationNotFound(application))?;
    Ok(WizardSession::from_snapshot(snapshot))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get application store status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;

    let response = StatusResponse {
        application_count: store.application_count(),
        persistent: store.is_persistent(),
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// APPLICATION LIFECYCLE HANDLERS
// =============================================================================

/// Create a new wizard application.
pub async fn create_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut store = state.store.write().await;

    match store.create() {
        Ok(id) => (StatusCode::OK, Json(CreatedResponse::success(id.0))),
        Err(e) => (
            error_status(&e),
            Json(CreatedResponse::error(format!("Create failed: {}", e))),
        ),
    }
}

/// List application identifiers.
pub async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;

    match store.list() {
        Ok(ids) => (
            StatusCode::OK,
            Json(ListResponse::success(ids.iter().map(|id| id.0).collect())),
        ),
        Err(e) => (
            error_status(&e),
            Json(ListResponse::error(format!("List failed: {}", e))),
        ),
    }
}

/// Wizard state for one application.
pub async fn show_handler(State(state): State<AppState>, Path(id): Path<u64>) -> impl IntoResponse {
    let store = state.store.read().await;

    match load_session(&store, ApplicationId(id)) {
        Ok(session) => (
            StatusCode::OK,
            Json(ApplicationStateResponse::from_state(id, &session.state())),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApplicationStateResponse::error(id, format!("{}", e))),
        ),
    }
}

/// Remove an application.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;

    match store.remove(ApplicationId(id)) {
        Ok(true) => (StatusCode::OK, Json(DeletedResponse::success())),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(DeletedResponse::error(format!(
                "Application {} not found",
                id
            ))),
        ),
        Err(e) => (
            error_status(&e),
            Json(DeletedResponse::error(format!("Delete failed: {}", e))),
        ),
    }
}

// =============================================================================
// FIELD HANDLERS
// =============================================================================

/// Set a field value on a stage.
pub async fn set_field_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<SetFieldRequest>,
) -> impl IntoResponse {
    // Validate addressing before touching the store
    let (stage, subform, field) = match request.parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(FieldResponse::error(format!("Invalid field address: {}", e))),
            );
        }
    };

    let application = ApplicationId(id);
    let mut store = state.store.write().await;
    let mut session = match load_session(&store, application) {
        Ok(s) => s,
        Err(e) => {
            return (error_status(&e), Json(FieldResponse::error(format!("{}", e))));
        }
    };

    let event = match session.set_field(stage, &subform, field, request.value) {
        Ok(event) => event,
        Err(e) => {
            return (
                error_status(&e),
                Json(FieldResponse::error(format!("Set field failed: {}", e))),
            );
        }
    };

    if let Err(e) = store.save_snapshot(application, &session.snapshot()) {
        return (
            error_status(&e),
            Json(FieldResponse::error(format!("Persist failed: {}", e))),
        );
    }

    let signal = session.progress().signal(stage);
    let transition = event.map(|e| match e.transition {
        CompletionTransition::Completed => "completed".to_string(),
        CompletionTransition::Reopened => "reopened".to_string(),
    });

    (
        StatusCode::OK,
        Json(FieldResponse::success(stage, signal, transition)),
    )
}

/// Clear a field value.
pub async fn clear_field_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ClearFieldRequest>,
) -> impl IntoResponse {
    let (stage, subform, field) = match request.parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(FieldResponse::error(format!("Invalid field address: {}", e))),
            );
        }
    };

    let application = ApplicationId(id);
    let mut store = state.store.write().await;
    let mut session = match load_session(&store, application) {
        Ok(s) => s,
        Err(e) => {
            return (error_status(&e), Json(FieldResponse::error(format!("{}", e))));
        }
    };

    let event = match session.clear_field(stage, &subform, &field) {
        Ok(event) => event,
        Err(e) => {
            return (
                error_status(&e),
                Json(FieldResponse::error(format!("Clear field failed: {}", e))),
            );
        }
    };

    if let Err(e) = store.save_snapshot(application, &session.snapshot()) {
        return (
            error_status(&e),
            Json(FieldResponse::error(format!("Persist failed: {}", e))),
        );
    }

    let signal = session.progress().signal(stage);
    let transition = event.map(|e| match e.transition {
        CompletionTransition::Completed => "completed".to_string(),
        CompletionTransition::Reopened => "reopened".to_string(),
    });

    (
        StatusCode::OK,
        Json(FieldResponse::success(stage, signal, transition)),
    )
}

// =============================================================================
// UPLOAD HANDLER
// =============================================================================

/// Attach a document to an upload field.
///
/// The field only counts toward completion once the store assigns an
/// identifier; a failed transfer leaves a retryable failure marker.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<UploadRequest>,
) -> impl IntoResponse {
    let (stage, subform, field) = match request.parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(UploadResponse::error(format!("Invalid field address: {}", e))),
            );
        }
    };

    let content = match request.decode_content() {
        Ok(content) => content,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(UploadResponse::error(format!("{}", e))));
        }
    };

    let application = ApplicationId(id);
    let mut store = state.store.write().await;
    let mut session = match load_session(&store, application) {
        Ok(s) => s,
        Err(e) => {
            return (error_status(&e), Json(UploadResponse::error(format!("{}", e))));
        }
    };

    if let Err(e) = session.begin_upload(stage, &subform, field.clone(), request.file_name.clone())
    {
        return (
            error_status(&e),
            Json(UploadResponse::error(format!("Upload failed: {}", e))),
        );
    }

    let mut files = state.files;
    match files.upload(&request.file_name, &content) {
        Ok(file_ref) => {
            if let Err(e) = session.resolve_upload(stage, &subform, &field, file_ref.clone()) {
                return (
                    error_status(&e),
                    Json(UploadResponse::error(format!("Upload failed: {}", e))),
                );
            }

            if let Err(e) = store.save_snapshot(application, &session.snapshot()) {
                return (
                    error_status(&e),
                    Json(UploadResponse::error(format!("Persist failed: {}", e))),
                );
            }

            let signal = session.progress().signal(stage);
            (
                StatusCode::OK,
                Json(UploadResponse::success(&file_ref, signal)),
            )
        }
        Err(e) => {
            // Record the failure on the field so the client can retry
            if let Err(mark) = session.fail_upload(stage, &subform, &field, e.to_string()) {
                tracing::warn!("Could not record upload failure: {}", mark);
            } else if let Err(persist) = store.save_snapshot(application, &session.snapshot()) {
                tracing::warn!("Could not persist upload failure: {}", persist);
            }

            (
                StatusCode::BAD_REQUEST,
                Json(UploadResponse::error(format!("Upload failed: {}", e))),
            )
        }
    }
}

// =============================================================================
// SAVE HANDLER
// =============================================================================

/// Commit a stage payload.
///
/// Validation and gating failures never reach the store and come back
/// as 4xx. A backend refusal is a `failed` outcome with the wizard
/// state untouched, so the client retries with values intact.
pub async fn save_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<SaveRequest>,
) -> impl IntoResponse {
    let application = ApplicationId(id);
    let mut store = state.store.write().await;
    let mut session = match load_session(&store, application) {
        Ok(s) => s,
        Err(e) => {
            return (error_status(&e), Json(SaveResponse::error(format!("{}", e))));
        }
    };

    let outcome =
        match StageBridge::save_with(&mut session, &mut *store, application, &request.payload) {
            Ok(outcome) => outcome,
            Err(e) => {
                return (
                    error_status(&e),
                    Json(SaveResponse::error(format!("Save rejected: {}", e))),
                );
            }
        };

    if let Err(e) = store.save_snapshot(application, &session.snapshot()) {
        return (
            error_status(&e),
            Json(SaveResponse::error(format!("Persist failed: {}", e))),
        );
    }

    let status = match &outcome {
        SaveOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };

    (status, Json(SaveResponse::from_outcome(&outcome)))
}

// =============================================================================
// NAVIGATION HANDLERS
// =============================================================================

/// Advance the wizard to the next stage.
pub async fn next_handler(State(state): State<AppState>, Path(id): Path<u64>) -> impl IntoResponse {
    let application = ApplicationId(id);
    let mut store = state.store.write().await;
    let mut session = match load_session(&store, application) {
        Ok(s) => s,
        Err(e) => {
            return (
                error_status(&e),
                Json(NavigateResponse::error(format!("{}", e))),
            );
        }
    };

    let outcome = session.go_next();
    if !outcome.is_denied() {
        if let Err(e) = store.save_snapshot(application, &session.snapshot()) {
            return (
                error_status(&e),
                Json(NavigateResponse::error(format!("Persist failed: {}", e))),
            );
        }
    }

    (StatusCode::OK, Json(NavigateResponse::from_outcome(&outcome)))
}

/// Jump to a specific stage.
pub async fn goto_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<NavigateRequest>,
) -> impl IntoResponse {
    let target = match Stage::parse(&request.stage) {
        Some(stage) => stage,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(NavigateResponse::error(format!(
                    "Unknown stage: {}",
                    request.stage
                ))),
            );
        }
    };

    let application = ApplicationId(id);
    let mut store = state.store.write().await;
    let mut session = match load_session(&store, application) {
        Ok(s) => s,
        Err(e) => {
            return (
                error_status(&e),
                Json(NavigateResponse::error(format!("{}", e))),
            );
        }
    };

    let outcome = session.go_to(target);
    if !outcome.is_denied() {
        if let Err(e) = store.save_snapshot(application, &session.snapshot()) {
            return (
                error_status(&e),
                Json(NavigateResponse::error(format!("Persist failed: {}", e))),
            );
        }
    }

    (StatusCode::OK, Json(NavigateResponse::from_outcome(&outcome)))
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export one application in canonical format.
pub async fn export_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let application = ApplicationId(id);
    let store = state.store.read().await;

    let snapshot = match store.load(application) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ExportResponse::error(format!(
                    "Application {} not found",
                    id
                ))),
            );
        }
        Err(e) => {
            return (
                error_status(&e),
                Json(ExportResponse::error(format!("{}", e))),
            );
        }
    };

    match export_canonical(application, &snapshot) {
        Ok(data) => {
            let checksum = canonical_checksum(&data);
            (StatusCode::OK, Json(ExportResponse::success(data, checksum)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

// =============================================================================
// REFERENCE HANDLER
// =============================================================================

/// Reference data list for one set.
pub async fn reference_handler(Path(set): Path<String>) -> impl IntoResponse {
    let reference_set = match ReferenceSet::parse(&set) {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ReferenceResponse::error(format!(
                    "Unknown reference set: {}",
                    set
                ))),
            );
        }
    };

    let source = StaticReference;
    match source.fetch(reference_set) {
        Ok(items) => (
            StatusCode::OK,
            Json(ReferenceResponse::success(reference_set, &items)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReferenceResponse::error(format!("Fetch failed: {}", e))),
        ),
    }
}
