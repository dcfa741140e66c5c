//! # Core Types Module
//!
//! Foundational types for the Trellis CORE.
//!
//! Everything here is deterministic and serialization-friendly:
//! BTreeMap-backed collections, integer arithmetic, tagged enums for
//! wire-facing sum types.

use crate::payload::StagePayload;
use crate::primitives::FULL_COMPLETION_BP;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for one wizard application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ApplicationId(pub u64);

/// Name of a single form field within a sub-form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldName(String);

impl FieldName {
    /// Create a new field name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a sub-form within a stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubFormId(String);

impl SubFormId {
    /// Create a new sub-form identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SubFormId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// WEIGHTS & SEQUENCE NUMBERS
// =============================================================================

/// Weight of a sub-form within its stage, in basis points.
///
/// The sub-form weights of one stage sum to [`FULL_COMPLETION_BP`].
/// Construction clamps to that bound so a single weight can never
/// exceed a whole stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Weight(u16);

impl Weight {
    /// Create a new weight, clamped to [`FULL_COMPLETION_BP`].
    #[must_use]
    pub const fn new(bp: u16) -> Self {
        if bp > FULL_COMPLETION_BP {
            Self(FULL_COMPLETION_BP)
        } else {
            Self(bp)
        }
    }

    /// The full weight of a single-sub-form stage.
    #[must_use]
    pub const fn full() -> Self {
        Self(FULL_COMPLETION_BP)
    }

    /// Get the weight in basis points.
    #[must_use]
    pub const fn bp(self) -> u16 {
        self.0
    }
}

/// Monotonic per-stage save sequence number.
///
/// Bumped on every save attempt; a resolving save whose sequence no
/// longer matches is stale and must be discarded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SaveSeq(pub u64);

impl SaveSeq {
    /// Create a new sequence number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The next sequence number (saturating).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

// =============================================================================
// FILE UPLOADS
// =============================================================================

/// Server-assigned reference to an uploaded file.
///
/// A field backed by an upload counts as present only once one of
/// these exists for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileRef {
    /// Server-assigned identifier.
    pub file_id: String,
    /// Retrieval URL.
    pub url: String,
    /// Original client-side file name.
    pub original_name: String,
}

impl FileRef {
    /// Create a new file reference.
    #[must_use]
    pub fn new(
        file_id: impl Into<String>,
        url: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            url: url.into(),
            original_name: original_name.into(),
        }
    }
}

/// Lifecycle of an upload-backed field.
///
/// Only `Uploaded` counts as present; an in-flight or failed upload
/// leaves the field absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// The transfer started but no identifier has been assigned yet.
    InFlight {
        /// Client-side file name, for display while pending.
        original_name: String,
    },
    /// The server assigned an identifier.
    Uploaded {
        /// The stored file.
        file: FileRef,
    },
    /// The transfer failed; the user may retry.
    Failed {
        /// Failure description for display.
        message: String,
    },
}

impl UploadState {
    /// Whether the upload has resolved to a stored file.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }

    /// The stored file reference, if resolved.
    #[must_use]
    pub const fn file(&self) -> Option<&FileRef> {
        match self {
            Self::Uploaded { file } => Some(file),
            _ => None,
        }
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// Value held by a single form field.
///
/// The presence rules live in [`FieldValue::is_present`]: numeric zero
/// and boolean false are deliberate entries and count as present, while
/// empty strings, lists, and records do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Explicitly unset.
    Empty,
    /// Free text.
    Text {
        /// The entered text.
        value: String,
    },
    /// Integer amount (monetary values in minor units).
    Number {
        /// The entered number.
        value: i64,
    },
    /// Boolean toggle.
    Flag {
        /// The entered flag.
        value: bool,
    },
    /// Ordered list of entries (e.g. schedule rows).
    List {
        /// The entries.
        values: Vec<String>,
    },
    /// Keyed composite entry (e.g. an address widget).
    Record {
        /// The component values.
        entries: BTreeMap<String, String>,
    },
    /// Upload-backed field.
    Upload {
        /// Current upload lifecycle state.
        state: UploadState,
    },
}

impl FieldValue {
    /// Convenience constructor for a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    /// Convenience constructor for a numeric value.
    #[must_use]
    pub const fn number(value: i64) -> Self {
        Self::Number { value }
    }

    /// Convenience constructor for a boolean value.
    #[must_use]
    pub const fn flag(value: bool) -> Self {
        Self::Flag { value }
    }

    /// Convenience constructor for a list value.
    #[must_use]
    pub fn list(values: impl IntoIterator<Item = String>) -> Self {
        Self::List {
            values: values.into_iter().collect(),
        }
    }

    /// Convenience constructor for a resolved upload.
    #[must_use]
    pub fn uploaded(file: FileRef) -> Self {
        Self::Upload {
            state: UploadState::Uploaded { file },
        }
    }

    /// Whether this value counts toward completion.
    ///
    /// - `Number(0)` and `Flag(false)` are present: the user entered them.
    /// - Empty text, lists, and records are absent.
    /// - An upload is present only once the server assigned an identifier.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Text { value } => !value.is_empty(),
            Self::Number { .. } | Self::Flag { .. } => true,
            Self::List { values } => !values.is_empty(),
            Self::Record { entries } => !entries.is_empty(),
            Self::Upload { state } => state.is_resolved(),
        }
    }

    /// Stable name of the value kind, matching the serialized variant.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Flag { .. } => "flag",
            Self::List { .. } => "list",
            Self::Record { .. } => "record",
            Self::Upload { .. } => "upload",
        }
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Stable name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A user-visible notification.
///
/// Denied navigation and failed saves surface as these, never as panics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Message for display.
    pub message: String,
    /// Display severity.
    pub severity: Severity,
}

impl Notification {
    /// Create a notification with the given severity.
    #[must_use]
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    /// Informational notification.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    /// Warning notification.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    /// Error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }
}

// =============================================================================
// COLLABORATOR SEAMS
// =============================================================================

/// Acknowledgement returned by a successful stage save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAck {
    /// Human-readable outcome message.
    pub message: String,
    /// The payload as the backend stored it, if echoed back.
    ///
    /// When present this is authoritative and replaces the submitted
    /// payload in the committed set.
    pub saved_entity: Option<StagePayload>,
}

impl SaveAck {
    /// Acknowledgement without an echoed entity.
    #[must_use]
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            saved_entity: None,
        }
    }

    /// Acknowledgement carrying the stored entity.
    #[must_use]
    pub fn with_entity(message: impl Into<String>, entity: StagePayload) -> Self {
        Self {
            message: message.into(),
            saved_entity: Some(entity),
        }
    }
}

/// External persistence boundary for committed stage payloads.
pub trait StagePersistence: Send + Sync {
    /// Persist a validated stage payload for an application.
    fn save(
        &mut self,
        application: ApplicationId,
        payload: &StagePayload,
    ) -> Result<SaveAck, TrellisError>;

    /// Fetch the previously committed payload for a stage, if any.
    fn fetch_stage(
        &self,
        application: ApplicationId,
        stage: Stage,
    ) -> Result<Option<StagePayload>, TrellisError>;
}

/// External file storage boundary.
///
/// Transfer mechanics are out of scope for the engine; the only thing
/// that matters is the server-assigned [`FileRef`] coming back.
pub trait FileStore: Send + Sync {
    /// Store a file and return its reference.
    fn upload(&mut self, original_name: &str, content: &[u8]) -> Result<FileRef, TrellisError>;
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    /// Deliver a notification to the user.
    fn notify(&self, notification: Notification);
}

/// Notifier that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Notifier that records everything, for assertions in tests and
/// batched display in synchronous front-ends.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    entries: std::sync::Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    /// Create an empty recording notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all notifications delivered so far.
    #[must_use]
    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification);
    }
}

/// File store that assigns sequential identifiers.
///
/// Content is not retained; this impl exists for deterministic tests
/// and single-process deployments where files live elsewhere.
#[derive(Debug, Default)]
pub struct SequentialFileStore {
    next: u64,
}

impl SequentialFileStore {
    /// Create a store starting at `file-1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }
}

impl FileStore for SequentialFileStore {
    fn upload(&mut self, original_name: &str, content: &[u8]) -> Result<FileRef, TrellisError> {
        if content.is_empty() {
            return Err(TrellisError::Upload("empty file content".to_string()));
        }
        self.next = self.next.saturating_add(1);
        let file_id = format!("file-{}", self.next);
        let url = format!("/files/{}", file_id);
        Ok(FileRef::new(file_id, url, original_name))
    }
}

/// Content-addressed file store using BLAKE3 identifiers.
///
/// Identical content always yields the same identifier, which keeps
/// re-uploads idempotent.
#[cfg(feature = "crypto-hash")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestFileStore;

#[cfg(feature = "crypto-hash")]
impl FileStore for DigestFileStore {
    fn upload(&mut self, original_name: &str, content: &[u8]) -> Result<FileRef, TrellisError> {
        if content.is_empty() {
            return Err(TrellisError::Upload("empty file content".to_string()));
        }
        let digest = blake3::hash(content).to_hex();
        let file_id = format!("file-{}", &digest.as_str()[..16]);
        let url = format!("/files/{}", file_id);
        Ok(FileRef::new(file_id, url, original_name))
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors produced by the Trellis CORE.
///
/// Every variant is locally recoverable; none aborts the wizard.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// A field name, value, or payload failed shape validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The external persistence boundary reported a failure.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// A file upload failed.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// A navigation request was rejected by gating.
    #[error("Navigation denied: {0}")]
    NavigationDenied(String),

    /// A stage identifier did not match any known stage.
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// A reference set identifier did not match any known set.
    #[error("Unknown reference set: {0}")]
    UnknownReferenceSet(String),

    /// No application exists under the given identifier.
    #[error("Application not found: {0:?}")]
    ApplicationNotFound(ApplicationId),

    /// Serialization failure.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization failure.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// I/O failure from the storage layer.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
