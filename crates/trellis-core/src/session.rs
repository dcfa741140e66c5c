//! # Session Module
//!
//! The wizard session: controller, live sub-form state, derived
//! progress, and committed payloads behind one façade.
//!
//! Progress is never stored. Snapshots carry position, field values,
//! committed payloads, and save sequence numbers; signals are
//! recomputed from those on every restore, so a snapshot can never
//! disagree with its own completion state.
//!
//! ## Storage Backends
//!
//! [`ApplicationStore`] keeps one snapshot per application and comes
//! in two flavours:
//! - `InMemory`: plain map, volatile
//! - `Persistent`: disk-backed redb storage

use crate::aggregator::StageAggregator;
use crate::bridge::{SaveOutcome, SaveTicket};
use crate::controller::{NavigationOutcome, WizardController};
use crate::payload::StagePayload;
use crate::progress::{StageProgress, WizardState};
use crate::signal::CompletionEvent;
use crate::stage::{SEQUENCE, Stage, WizardPosition};
use crate::storage::RedbStore;
use crate::subform::SubFormState;
use crate::types::{
    ApplicationId, FieldName, FieldValue, FileRef, SaveAck, SaveSeq, StagePersistence, SubFormId,
    TrellisError, Weight,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Log an error and convert the result to its default value.
///
/// Storage and mirror errors inside infallible surfaces are logged
/// before being absorbed, preventing silent error swallowing.
///
/// Uses stderr logging for CORE (no external dependencies).
/// The app layer should configure proper tracing if needed.
#[inline]
fn log_and_default<T: Default>(result: Result<T, TrellisError>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            // Note: CORE avoids tracing dependency to stay minimal.
            // App layer should redirect stderr to tracing if needed.
            eprintln!(
                "{{\"level\":\"warn\",\"target\":\"trellis_core::session\",\"message\":\"error in {}: {}\"}}",
                context, e
            );
            T::default()
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Durable form of one wizard session.
///
/// Holds everything except derived progress; restoring recomputes the
/// signals from the stored field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSnapshot {
    /// Wizard position at capture time.
    pub position: WizardPosition,
    /// Live field values, per stage and sub-form.
    pub forms: BTreeMap<Stage, BTreeMap<SubFormId, SubFormState>>,
    /// Committed payloads.
    pub committed: BTreeMap<Stage, StagePayload>,
    /// Per-stage save sequence numbers.
    pub save_seq: BTreeMap<Stage, SaveSeq>,
}

fn seeded_forms() -> BTreeMap<Stage, BTreeMap<SubFormId, SubFormState>> {
    let mut forms = BTreeMap::new();
    for stage in SEQUENCE {
        let mut stage_forms = BTreeMap::new();
        for plan in stage.blueprint() {
            stage_forms.insert(SubFormId::new(plan.id), SubFormState::from_plan(plan));
        }
        forms.insert(stage, stage_forms);
    }
    forms
}

// =============================================================================
// WIZARD SESSION
// =============================================================================

/// One application's wizard: edits, navigation, saves, and progress.
#[derive(Debug, Clone)]
pub struct WizardSession {
    /// Position holder and navigation gate.
    controller: WizardController,
    /// Live sub-form state, per stage.
    forms: BTreeMap<Stage, BTreeMap<SubFormId, SubFormState>>,
    /// Derived per-stage completion signals.
    progress: StageProgress,
    /// Payloads the backend has accepted.
    committed: BTreeMap<Stage, StagePayload>,
    /// Per-stage save sequence numbers for staleness checks.
    save_seq: BTreeMap<Stage, SaveSeq>,
}

impl WizardSession {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Start a fresh wizard at the first stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            controller: WizardController::new(),
            forms: seeded_forms(),
            progress: StageProgress::new(),
            committed: BTreeMap::new(),
            save_seq: BTreeMap::new(),
        }
    }

    /// Restore a session from a snapshot.
    ///
    /// Forms are seeded from the blueprints first, then overlaid with
    /// the stored state, so a snapshot from an older layout still
    /// yields every known sub-form. Signals are recomputed; restoring
    /// is not a transition, so no events surface.
    #[must_use]
    pub fn from_snapshot(snapshot: WizardSnapshot) -> Self {
        let mut forms = seeded_forms();
        for (stage, stage_forms) in snapshot.forms {
            let target = forms.entry(stage).or_default();
            for (id, state) in stage_forms {
                target.insert(id, state);
            }
        }
        let mut session = Self {
            controller: WizardController::resume(snapshot.position),
            forms,
            progress: StageProgress::new(),
            committed: snapshot.committed,
            save_seq: snapshot.save_seq,
        };
        session.recompute_all();
        session
    }

    /// Capture the durable state of this session.
    #[must_use]
    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            position: self.controller.position(),
            forms: self.forms.clone(),
            committed: self.committed.clone(),
            save_seq: self.save_seq.clone(),
        }
    }

    // =========================================================================
    // FIELD EDITING
    // =========================================================================

    /// Set one field and recompute the stage.
    pub fn set_field(
        &mut self,
        stage: Stage,
        subform: &SubFormId,
        field: FieldName,
        value: FieldValue,
    ) -> Result<Option<CompletionEvent>, TrellisError> {
        self.ensure_editable()?;
        self.form_mut(stage, subform)?.set_value(field, value)?;
        Ok(self.recompute_stage(stage))
    }

    /// Clear one field and recompute the stage.
    pub fn clear_field(
        &mut self,
        stage: Stage,
        subform: &SubFormId,
        field: &FieldName,
    ) -> Result<Option<CompletionEvent>, TrellisError> {
        self.ensure_editable()?;
        self.form_mut(stage, subform)?.clear_value(field);
        Ok(self.recompute_stage(stage))
    }

    /// Mark an upload-backed field as in flight.
    pub fn begin_upload(
        &mut self,
        stage: Stage,
        subform: &SubFormId,
        field: FieldName,
        original_name: impl Into<String>,
    ) -> Result<Option<CompletionEvent>, TrellisError> {
        self.ensure_editable()?;
        self.form_mut(stage, subform)?
            .begin_upload(field, original_name)?;
        Ok(self.recompute_stage(stage))
    }

    /// Attach a server-assigned file reference to an in-flight upload.
    ///
    /// The completion event, if any, fires here: the field only starts
    /// counting once the reference exists.
    pub fn resolve_upload(
        &mut self,
        stage: Stage,
        subform: &SubFormId,
        field: &FieldName,
        file: FileRef,
    ) -> Result<Option<CompletionEvent>, TrellisError> {
        self.ensure_editable()?;
        self.form_mut(stage, subform)?.resolve_upload(field, file)?;
        Ok(self.recompute_stage(stage))
    }

    /// Mark an in-flight upload as failed.
    pub fn fail_upload(
        &mut self,
        stage: Stage,
        subform: &SubFormId,
        field: &FieldName,
        message: impl Into<String>,
    ) -> Result<Option<CompletionEvent>, TrellisError> {
        self.ensure_editable()?;
        self.form_mut(stage, subform)?.fail_upload(field, message)?;
        Ok(self.recompute_stage(stage))
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Advance one stage, or submit from the final stage.
    pub fn go_next(&mut self) -> NavigationOutcome {
        self.controller.go_next(&self.progress)
    }

    /// Jump directly to a stage.
    pub fn go_to(&mut self, target: Stage) -> NavigationOutcome {
        self.controller.go_to(target, &self.progress)
    }

    // =========================================================================
    // SAVING
    // =========================================================================

    /// Validate a payload for the active stage and issue a save ticket.
    ///
    /// Bumps the stage's sequence number, which supersedes any save
    /// still in flight for the same stage.
    pub fn begin_save(&mut self, payload: &StagePayload) -> Result<SaveTicket, TrellisError> {
        self.ensure_editable()?;
        let Some(active) = self.controller.active_stage() else {
            return Err(TrellisError::Validation(
                "submitted application is read-only".to_string(),
            ));
        };
        let stage = payload.stage();
        if stage != active {
            return Err(TrellisError::Validation(format!(
                "payload targets {} but {} is active",
                stage.name(),
                active.name()
            )));
        }
        payload.validate()?;

        let slot = self.save_seq.entry(stage).or_default();
        *slot = slot.next();
        let seq = *slot;
        Ok(SaveTicket::issue(stage, seq, payload.clone()))
    }

    /// Resolve a save ticket with the backend's answer.
    ///
    /// A ticket is stale once its stage is no longer active or its
    /// sequence number was superseded; stale results are discarded
    /// without touching state. Failure also leaves state untouched,
    /// preserving every entered value for retry. Success commits the
    /// payload; it never navigates.
    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<SaveAck, TrellisError>,
    ) -> SaveOutcome {
        let stage = ticket.stage();
        let current_seq = self.save_seq.get(&stage).copied().unwrap_or_default();
        if self.controller.active_stage() != Some(stage) || current_seq != ticket.seq() {
            return SaveOutcome::Stale { stage };
        }

        match result {
            Ok(ack) => {
                let payload = match ack.saved_entity {
                    Some(entity) if entity.stage() == stage => entity,
                    Some(entity) => {
                        // A mis-tagged echo must never commit under the
                        // wrong stage; fall back to what was submitted.
                        eprintln!(
                            "{{\"level\":\"warn\",\"target\":\"trellis_core::session\",\"message\":\"backend echoed {} for a {} save; echo discarded\"}}",
                            entity.stage_name(),
                            stage.name()
                        );
                        ticket.into_payload()
                    }
                    None => ticket.into_payload(),
                };
                let event = self.commit_payload(payload);
                SaveOutcome::Committed {
                    stage,
                    message: ack.message,
                    event,
                }
            }
            Err(error) => SaveOutcome::Failed { stage, error },
        }
    }

    /// Commit a payload: record it and mirror its fields for pre-fill.
    ///
    /// Used by save resolution and by hydration; not gated on
    /// position, since committed data is a fact, not an edit.
    pub fn commit_payload(&mut self, payload: StagePayload) -> Option<CompletionEvent> {
        let stage = payload.stage();
        for (name, value) in payload.to_fields() {
            let result = self.mirror_field(stage, name, value);
            log_and_default(result, "commit_payload");
        }
        self.committed.insert(stage, payload);
        self.recompute_stage(stage)
    }

    fn mirror_field(
        &mut self,
        stage: Stage,
        name: FieldName,
        value: FieldValue,
    ) -> Result<(), TrellisError> {
        let subform_id = stage.subform_for_field(name.as_str()).ok_or_else(|| {
            TrellisError::Validation(format!(
                "field '{}' has no sub-form in {}",
                name.as_str(),
                stage.name()
            ))
        })?;
        let form = self
            .forms
            .get_mut(&stage)
            .and_then(|forms| forms.get_mut(subform_id))
            .ok_or_else(|| {
                TrellisError::Validation(format!(
                    "unknown sub-form '{subform_id}' in {}",
                    stage.name()
                ))
            })?;
        form.set_value(name, value)
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// The current wizard position.
    #[must_use]
    pub fn position(&self) -> WizardPosition {
        self.controller.position()
    }

    /// The active stage, unless submitted.
    #[must_use]
    pub fn active_stage(&self) -> Option<Stage> {
        self.controller.active_stage()
    }

    /// The derived per-stage progress.
    #[must_use]
    pub fn progress(&self) -> &StageProgress {
        &self.progress
    }

    /// Read-only state for progress indicator surfaces.
    #[must_use]
    pub fn state(&self) -> WizardState {
        WizardState {
            position: self.position(),
            stages: self.progress.iter().collect(),
            committed: SEQUENCE
                .iter()
                .copied()
                .filter(|stage| self.committed.contains_key(stage))
                .collect(),
            overall_basis_points: self.progress.overall_basis_points(),
        }
    }

    /// One sub-form's live state.
    #[must_use]
    pub fn form(&self, stage: Stage, subform: &SubFormId) -> Option<&SubFormState> {
        self.forms.get(&stage)?.get(subform)
    }

    /// The committed payload of a stage, if any.
    #[must_use]
    pub fn committed_payload(&self, stage: Stage) -> Option<&StagePayload> {
        self.committed.get(&stage)
    }

    /// Whether a stage has a committed payload.
    #[must_use]
    pub fn is_committed(&self, stage: Stage) -> bool {
        self.committed.contains_key(&stage)
    }

    /// One field's current value.
    #[must_use]
    pub fn field_value(
        &self,
        stage: Stage,
        subform: &SubFormId,
        field: &FieldName,
    ) -> Option<&FieldValue> {
        self.form(stage, subform)?.value(field)
    }

    // =========================================================================
    // RECOMPUTATION
    // =========================================================================

    fn ensure_editable(&self) -> Result<(), TrellisError> {
        if self.controller.position().is_submitted() {
            return Err(TrellisError::Validation(
                "submitted application is read-only".to_string(),
            ));
        }
        Ok(())
    }

    fn form_mut(
        &mut self,
        stage: Stage,
        subform: &SubFormId,
    ) -> Result<&mut SubFormState, TrellisError> {
        self.forms
            .get_mut(&stage)
            .and_then(|forms| forms.get_mut(subform))
            .ok_or_else(|| {
                TrellisError::Validation(format!(
                    "unknown sub-form '{}' in {}",
                    subform.as_str(),
                    stage.name()
                ))
            })
    }

    fn recompute_stage(&mut self, stage: Stage) -> Option<CompletionEvent> {
        let signal = {
            let empty = BTreeMap::new();
            let stage_forms = self.forms.get(&stage).unwrap_or(&empty);
            let parts = stage.blueprint().iter().filter_map(|plan| {
                stage_forms
                    .get(plan.id)
                    .map(|state| (state, Weight::new(plan.weight_bp)))
            });
            StageAggregator::stage_signal(parts)
        };
        self.progress.apply(stage, signal)
    }

    fn recompute_all(&mut self) {
        for stage in SEQUENCE {
            self.recompute_stage(stage);
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APPLICATION STORE
// =============================================================================

/// Registry of wizard applications, one snapshot each.
#[derive(Debug)]
pub enum ApplicationStore {
    /// Plain map, volatile.
    InMemory(BTreeMap<ApplicationId, WizardSnapshot>),
    /// Disk-backed redb storage (ACID, persistent).
    Persistent(RedbStore),
}

// NOTE: ApplicationStore does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

impl ApplicationStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::InMemory(BTreeMap::new())
    }

    /// Open or create a redb-backed store at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, TrellisError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Whether this store survives a restart.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    /// Register a fresh application and return its identifier.
    pub fn create(&mut self) -> Result<ApplicationId, TrellisError> {
        let snapshot = WizardSession::new().snapshot();
        match self {
            Self::InMemory(map) => {
                let id = ApplicationId(
                    map.keys()
                        .next_back()
                        .map_or(1, |last| last.0.saturating_add(1)),
                );
                map.insert(id, snapshot);
                Ok(id)
            }
            Self::Persistent(store) => {
                let id = store.allocate_id()?;
                store.put(id, &snapshot)?;
                Ok(id)
            }
        }
    }

    /// Load one application's snapshot.
    pub fn load(&self, application: ApplicationId) -> Result<Option<WizardSnapshot>, TrellisError> {
        match self {
            Self::InMemory(map) => Ok(map.get(&application).cloned()),
            Self::Persistent(store) => store.get(application),
        }
    }

    /// Store one application's snapshot, replacing any previous one.
    pub fn save_snapshot(
        &mut self,
        application: ApplicationId,
        snapshot: &WizardSnapshot,
    ) -> Result<(), TrellisError> {
        match self {
            Self::InMemory(map) => {
                map.insert(application, snapshot.clone());
                Ok(())
            }
            Self::Persistent(store) => store.put(application, snapshot),
        }
    }

    /// All application identifiers, ascending.
    pub fn list(&self) -> Result<Vec<ApplicationId>, TrellisError> {
        match self {
            Self::InMemory(map) => Ok(map.keys().copied().collect()),
            Self::Persistent(store) => store.list_ids(),
        }
    }

    /// Delete one application. Returns whether it existed.
    pub fn remove(&mut self, application: ApplicationId) -> Result<bool, TrellisError> {
        match self {
            Self::InMemory(map) => Ok(map.remove(&application).is_some()),
            Self::Persistent(store) => store.remove(application),
        }
    }

    /// Number of registered applications.
    ///
    /// Storage errors are logged and reported as zero; this feeds
    /// status surfaces that must not fail.
    #[must_use]
    pub fn application_count(&self) -> usize {
        match self {
            Self::InMemory(map) => map.len(),
            Self::Persistent(store) => {
                log_and_default(store.application_count(), "application_count")
            }
        }
    }
}

impl Default for ApplicationStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// The registry itself is a persistence boundary: committed payloads
/// live inside the stored snapshots.
impl StagePersistence for ApplicationStore {
    fn save(
        &mut self,
        application: ApplicationId,
        payload: &StagePayload,
    ) -> Result<SaveAck, TrellisError> {
        let mut snapshot = self
            .load(application)?
            .ok_or(TrellisError::ApplicationNotFound(application))?;
        snapshot.committed.insert(payload.stage(), payload.clone());
        self.save_snapshot(application, &snapshot)?;
        Ok(SaveAck::with_entity(
            format!("{} saved", payload.stage().title()),
            payload.clone(),
        ))
    }

    fn fetch_stage(
        &self,
        application: ApplicationId,
        stage: Stage,
    ) -> Result<Option<StagePayload>, TrellisError> {
        let snapshot = self
            .load(application)?
            .ok_or(TrellisError::ApplicationNotFound(application))?;
        Ok(snapshot.committed.get(&stage).cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================
