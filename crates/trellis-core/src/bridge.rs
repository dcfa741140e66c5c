//! # Stage Data Bridge Module
//!
//! The save boundary between the wizard and external persistence.
//!
//! Saving is two-phase. `begin_save` validates the payload and issues
//! a ticket carrying a per-stage sequence number; `complete_save`
//! applies the backend's answer only if the ticket is still current.
//! A save never navigates: advancing is always a separate, explicit
//! request.

use crate::payload::StagePayload;
use crate::session::WizardSession;
use crate::signal::CompletionEvent;
use crate::stage::{SEQUENCE, Stage};
use crate::types::{ApplicationId, SaveAck, SaveSeq, StagePersistence, TrellisError};
use std::collections::BTreeMap;

// =============================================================================
// SAVE TICKET
// =============================================================================

/// Proof that a save attempt passed validation and gating.
///
/// Only [`WizardSession::begin_save`] issues tickets, so holding one
/// means the payload inside was validated for the then-active stage.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    stage: Stage,
    seq: SaveSeq,
    payload: StagePayload,
}

impl SaveTicket {
    pub(crate) const fn issue(stage: Stage, seq: SaveSeq, payload: StagePayload) -> Self {
        Self {
            stage,
            seq,
            payload,
        }
    }

    /// The stage being saved.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The sequence number of this attempt.
    #[must_use]
    pub const fn seq(&self) -> SaveSeq {
        self.seq
    }

    /// The validated payload.
    #[must_use]
    pub const fn payload(&self) -> &StagePayload {
        &self.payload
    }

    pub(crate) fn into_payload(self) -> StagePayload {
        self.payload
    }
}

// =============================================================================
// SAVE OUTCOME
// =============================================================================

/// Result of resolving one save attempt.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The backend accepted; the stage is committed and pre-fills on
    /// return.
    Committed {
        /// The saved stage.
        stage: Stage,
        /// Backend acknowledgement message.
        message: String,
        /// Completion event, if the commit flipped the stage.
        event: Option<CompletionEvent>,
    },
    /// The backend refused; nothing changed, the user retries in place.
    Failed {
        /// The stage that failed to save.
        stage: Stage,
        /// The backend's error.
        error: TrellisError,
    },
    /// The ticket was superseded before the result arrived; the result
    /// was discarded.
    Stale {
        /// The stage of the superseded attempt.
        stage: Stage,
    },
}

impl SaveOutcome {
    /// Whether the save committed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// The stage the outcome refers to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Committed { stage, .. } | Self::Failed { stage, .. } | Self::Stale { stage } => {
                *stage
            }
        }
    }
}

// =============================================================================
// STAGE BRIDGE
// =============================================================================

/// Orchestrates saves and hydration against a persistence boundary.
///
/// For synchronous backends this is the whole dance; asynchronous
/// front-ends drive `begin_save` and `complete_save` on the session
/// directly, with the network call in between.
pub struct StageBridge;

impl StageBridge {
    /// Validate, persist, and resolve one save in a single call.
    ///
    /// Returns `Err` only when the attempt never reached the backend
    /// (validation or gating failure). Backend failures come back as
    /// [`SaveOutcome::Failed`] with session state untouched.
    pub fn save_with<P: StagePersistence + ?Sized>(
        session: &mut WizardSession,
        persistence: &mut P,
        application: ApplicationId,
        payload: &StagePayload,
    ) -> Result<SaveOutcome, TrellisError> {
        let ticket = session.begin_save(payload)?;
        let result = persistence.save(application, ticket.payload());
        Ok(session.complete_save(ticket, result))
    }

    /// Pre-fill a session from previously committed payloads.
    ///
    /// Fetches every stage and commits whatever the backend returns.
    /// Events fire for stages that become complete through pre-fill.
    pub fn hydrate<P: StagePersistence + ?Sized>(
        session: &mut WizardSession,
        persistence: &P,
        application: ApplicationId,
    ) -> Result<Vec<CompletionEvent>, TrellisError> {
        let mut events = Vec::new();
        for stage in SEQUENCE {
            if let Some(payload) = persistence.fetch_stage(application, stage)? {
                if let Some(event) = session.commit_payload(payload) {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }
}

// =============================================================================
// IN-MEMORY PERSISTENCE
// =============================================================================

/// Persistence boundary backed by a plain map.
///
/// Deterministic stand-in for a remote backend; `fail_next_save` arms
/// a one-shot failure for exercising the retry path.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: BTreeMap<(ApplicationId, Stage), StagePayload>,
    fail_next: Option<String>,
}

impl MemoryPersistence {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next save fail with the given message.
    pub fn fail_next_save(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    /// Number of stored payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StagePersistence for MemoryPersistence {
    fn save(
        &mut self,
        application: ApplicationId,
        payload: &StagePayload,
    ) -> Result<SaveAck, TrellisError> {
        if let Some(message) = self.fail_next.take() {
            return Err(TrellisError::Persistence(message));
        }
        let stage = payload.stage();
        self.entries.insert((application, stage), payload.clone());
        Ok(SaveAck::with_entity(
            format!("{} saved", stage.title()),
            payload.clone(),
        ))
    }

    fn fetch_stage(
        &self,
        application: ApplicationId,
        stage: Stage,
    ) -> Result<Option<StagePayload>, TrellisError> {
        Ok(self.entries.get(&(application, stage)).cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================
