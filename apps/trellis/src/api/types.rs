//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use serde::{Deserialize, Serialize};
use trellis_core::{
    CompletionSignal, FieldName, FieldValue, FileRef, NavigationOutcome, Notification,
    ReferenceItem, ReferenceSet, SaveOutcome, Stage, StagePayload, SubFormId, TrellisError,
    WizardState, primitives::MAX_FIELD_NAME_LENGTH,
};

/// Maximum decoded size of an uploaded document (1 MB).
///
/// The HTTP body limit already caps the encoded payload; this bounds
/// the decoded bytes handed to the file store.
const MAX_UPLOAD_CONTENT_SIZE: usize = 1024 * 1024;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Application store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub application_count: usize,
    pub persistent: bool,
}

// =============================================================================
// APPLICATION CREATION / LISTING
// =============================================================================

/// Application creation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub application_id: Option<u64>,
    pub error: Option<String>,
}

impl CreatedResponse {
    pub fn success(application_id: u64) -> Self {
        Self {
            success: true,
            application_id: Some(application_id),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            application_id: None,
            error: Some(msg.into()),
        }
    }
}

/// Application listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    pub applications: Vec<u64>,
    pub error: Option<String>,
}

impl ListResponse {
    pub fn success(applications: Vec<u64>) -> Self {
        Self {
            success: true,
            applications,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            applications: vec![],
            error: Some(msg.into()),
        }
    }
}

/// Application deletion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl DeletedResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// WIZARD STATE RESPONSE
// =============================================================================

/// Per-stage completion entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageStateJson {
    pub stage: String,
    pub title: String,
    pub basis_points: u16,
    pub complete: bool,
    pub committed: bool,
}

/// Wizard state response for one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStateResponse {
    pub success: bool,
    pub application_id: u64,
    pub position: Option<String>,
    pub submitted: bool,
    pub overall_basis_points: u16,
    pub overall_percent: String,
    pub stages: Vec<StageStateJson>,
    pub error: Option<String>,
}

impl ApplicationStateResponse {
    pub fn from_state(application_id: u64, state: &WizardState) -> Self {
        let stages = state
            .stages
            .iter()
            .map(|(stage, signal)| StageStateJson {
                stage: stage.name().to_string(),
                title: stage.title().to_string(),
                basis_points: signal.basis_points,
                complete: signal.complete,
                committed: state.committed.contains(stage),
            })
            .collect();

        Self {
            success: true,
            application_id,
            position: state.position.stage().map(|s| s.name().to_string()),
            submitted: state.position.is_submitted(),
            overall_basis_points: state.overall_basis_points,
            overall_percent: format!(
                "{}.{:02}%",
                state.overall_basis_points / 100,
                state.overall_basis_points % 100
            ),
            stages,
            error: None,
        }
    }

    pub fn error(application_id: u64, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            application_id,
            position: None,
            submitted: false,
            overall_basis_points: 0,
            overall_percent: "0.00%".to_string(),
            stages: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// FIELD REQUESTS
// =============================================================================

/// Resolve and validate field addressing shared by field requests.
///
/// Validates:
/// - `stage` names a wizard stage
/// - `field` is non-empty and within `MAX_FIELD_NAME_LENGTH` (256 bytes)
/// - `sub_form` resolves from the stage blueprint when omitted
///
/// This rejects malformed addressing at the API boundary, before data
/// reaches the wizard session.
fn resolve_parts(
    stage: &str,
    sub_form: Option<&str>,
    field: &str,
) -> Result<(Stage, SubFormId, FieldName), TrellisError> {
    let stage = Stage::parse(stage).ok_or_else(|| TrellisError::UnknownStage(stage.to_string()))?;

    if field.is_empty() {
        return Err(TrellisError::Validation("Field name is empty".to_string()));
    }
    if field.len() > MAX_FIELD_NAME_LENGTH {
        return Err(TrellisError::Validation(format!(
            "Field name length {} exceeds maximum {} bytes",
            field.len(),
            MAX_FIELD_NAME_LENGTH
        )));
    }

    let subform = match sub_form {
        Some(id) => SubFormId::new(id),
        None => stage
            .subform_for_field(field)
            .map(SubFormId::new)
            .ok_or_else(|| {
                TrellisError::Validation(format!(
                    "Field '{}' is not in the {} blueprint; pass sub_form explicitly",
                    field,
                    stage.name()
                ))
            })?,
    };

    Ok((stage, subform, FieldName::new(field)))
}

/// Field update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetFieldRequest {
    pub stage: String,
    pub sub_form: Option<String>,
    pub field: String,
    pub value: FieldValue,
}

impl SetFieldRequest {
    /// Resolve and validate the addressing parts.
    pub fn parts(&self) -> Result<(Stage, SubFormId, FieldName), TrellisError> {
        resolve_parts(&self.stage, self.sub_form.as_deref(), &self.field)
    }
}

/// Field clear request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearFieldRequest {
    pub stage: String,
    pub sub_form: Option<String>,
    pub field: String,
}

impl ClearFieldRequest {
    /// Resolve and validate the addressing parts.
    pub fn parts(&self) -> Result<(Stage, SubFormId, FieldName), TrellisError> {
        resolve_parts(&self.stage, self.sub_form.as_deref(), &self.field)
    }
}

/// Field update response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResponse {
    pub success: bool,
    pub stage: Option<String>,
    pub stage_basis_points: u16,
    pub stage_complete: bool,
    pub transition: Option<String>,
    pub error: Option<String>,
}

impl FieldResponse {
    pub fn success(stage: Stage, signal: CompletionSignal, transition: Option<String>) -> Self {
        Self {
            success: true,
            stage: Some(stage.name().to_string()),
            stage_basis_points: signal.basis_points,
            stage_complete: signal.complete,
            transition,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            stage: None,
            stage_basis_points: 0,
            stage_complete: false,
            transition: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// UPLOAD REQUEST/RESPONSE
// =============================================================================

/// Document upload request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub stage: String,
    pub sub_form: Option<String>,
    pub field: String,
    pub file_name: String,
    pub content_base64: String, // Base64 encoded document bytes
}

impl UploadRequest {
    /// Resolve and validate the addressing parts.
    pub fn parts(&self) -> Result<(Stage, SubFormId, FieldName), TrellisError> {
        resolve_parts(&self.stage, self.sub_form.as_deref(), &self.field)
    }

    /// Decode and validate the document content.
    pub fn decode_content(&self) -> Result<Vec<u8>, TrellisError> {
        if self.file_name.is_empty() {
            return Err(TrellisError::Upload("File name is empty".to_string()));
        }

        let content = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &self.content_base64,
        )
        .map_err(|e| TrellisError::Upload(format!("Invalid base64 content: {}", e)))?;

        if content.is_empty() {
            return Err(TrellisError::Upload("Document is empty".to_string()));
        }
        if content.len() > MAX_UPLOAD_CONTENT_SIZE {
            return Err(TrellisError::Upload(format!(
                "Document size {} exceeds maximum {} bytes",
                content.len(),
                MAX_UPLOAD_CONTENT_SIZE
            )));
        }

        Ok(content)
    }
}

/// Document upload response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: Option<String>,
    pub url: Option<String>,
    pub original_name: Option<String>,
    pub stage_basis_points: u16,
    pub stage_complete: bool,
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn success(file: &FileRef, signal: CompletionSignal) -> Self {
        Self {
            success: true,
            file_id: Some(file.file_id.clone()),
            url: Some(file.url.clone()),
            original_name: Some(file.original_name.clone()),
            stage_basis_points: signal.basis_points,
            stage_complete: signal.complete,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            file_id: None,
            url: None,
            original_name: None,
            stage_basis_points: 0,
            stage_complete: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// SAVE REQUEST/RESPONSE
// =============================================================================

/// Stage save request carrying a tagged payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub payload: StagePayload,
}

/// Stage save response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    pub outcome: Option<String>,
    pub stage: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn from_outcome(outcome: &SaveOutcome) -> Self {
        match outcome {
            SaveOutcome::Committed { stage, message, .. } => Self {
                success: true,
                outcome: Some("committed".to_string()),
                stage: Some(stage.name().to_string()),
                message: Some(message.clone()),
                error: None,
            },
            SaveOutcome::Failed { stage, error } => Self {
                success: false,
                outcome: Some("failed".to_string()),
                stage: Some(stage.name().to_string()),
                message: None,
                error: Some(error.to_string()),
            },
            SaveOutcome::Stale { stage } => Self {
                success: true,
                outcome: Some("stale".to_string()),
                stage: Some(stage.name().to_string()),
                message: Some("Save superseded by a newer attempt".to_string()),
                error: None,
            },
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: None,
            stage: None,
            message: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// NAVIGATION REQUEST/RESPONSE
// =============================================================================

/// Jump request naming the target stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub stage: String,
}

/// Notification JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJson {
    pub message: String,
    pub severity: String,
}

impl NotificationJson {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            message: notification.message.clone(),
            severity: notification.severity.as_str().to_string(),
        }
    }
}

/// Navigation response.
///
/// A denied move is a successful response: the wizard answered the
/// request, the answer is "no" plus a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateResponse {
    pub success: bool,
    pub outcome: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub reason: Option<String>,
    pub notification: Option<NotificationJson>,
    pub error: Option<String>,
}

impl NavigateResponse {
    pub fn from_outcome(outcome: &NavigationOutcome) -> Self {
        let notification = outcome
            .notification()
            .as_ref()
            .map(NotificationJson::from_notification);

        match outcome {
            NavigationOutcome::Moved { from, to } => Self {
                success: true,
                outcome: Some("moved".to_string()),
                from: Some(from.name().to_string()),
                to: Some(to.name().to_string()),
                reason: None,
                notification,
                error: None,
            },
            NavigationOutcome::Submitted { from } => Self {
                success: true,
                outcome: Some("submitted".to_string()),
                from: Some(from.name().to_string()),
                to: None,
                reason: None,
                notification,
                error: None,
            },
            NavigationOutcome::Denied { reason } => Self {
                success: true,
                outcome: Some("denied".to_string()),
                from: None,
                to: None,
                reason: Some(reason.message()),
                notification,
                error: None,
            },
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: None,
            from: None,
            to: None,
            reason: None,
            notification: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// REFERENCE RESPONSE
// =============================================================================

/// Reference item JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceItemJson {
    pub code: String,
    pub label: String,
}

/// Reference list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceResponse {
    pub success: bool,
    pub set: Option<String>,
    pub items: Vec<ReferenceItemJson>,
    pub error: Option<String>,
}

impl ReferenceResponse {
    pub fn success(set: ReferenceSet, items: &[ReferenceItem]) -> Self {
        Self {
            success: true,
            set: Some(set.name().to_string()),
            items: items
                .iter()
                .map(|item| ReferenceItemJson {
                    code: item.code.clone(),
                    label: item.label.clone(),
                })
                .collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            set: None,
            items: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// MIDDLEWARE REJECTION
// =============================================================================

/// Body returned when middleware rejects a request (401, 429).
///
/// Carries the same `success`/`error` envelope as every handler response
/// so clients parse rejections with the same code path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl RejectionResponse {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Canonical export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: Vec<u8>, checksum: u64) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}
