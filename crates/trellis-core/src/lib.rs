//! # trellis-core
//!
//! The deterministic Wizard Engine for Trellis - THE LOGIC.
//!
//! This crate implements the CORE of a staged bond-issuance filing flow:
//! weighted completion scoring, gated navigation, stage payload commits,
//! and durable application snapshots.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where wizard state lives (stateful)
//! - Scores completion in integer basis points; floats never enter the engine
//! - Never navigates on its own; saving and navigation are separate acts
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod aggregator;
pub mod bridge;
pub mod controller;
pub mod evaluator;
pub mod export;
pub mod formats;
pub mod payload;
pub mod primitives;
pub mod progress;
pub mod reference;
pub mod session;
pub mod signal;
pub mod stage;
pub mod storage;
pub mod subform;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ApplicationId, FieldName, FieldValue, FileRef, FileStore, MemoryNotifier, Notification,
    Notifier, NullNotifier, SaveAck, SaveSeq, SequentialFileStore, Severity, StagePersistence,
    SubFormId, TrellisError, UploadState, Weight,
};

#[cfg(feature = "crypto-hash")]
pub use types::DigestFileStore;

// =============================================================================
// RE-EXPORTS: Wizard Engine
// =============================================================================

pub use aggregator::StageAggregator;
pub use bridge::{MemoryPersistence, SaveOutcome, SaveTicket, StageBridge};
pub use controller::{DenialReason, NavigationOutcome, WizardController};
pub use evaluator::{Contribution, Evaluator};
pub use export::{
    CanonicalHeader, canonical_checksum, export_canonical, import_canonical, verify_canonical,
};
pub use payload::StagePayload;
pub use progress::{StageProgress, WizardState};
pub use reference::{
    ALL_REFERENCE_SETS, FallbackReference, ReferenceItem, ReferenceSet, ReferenceSource,
    StaticReference,
};
pub use session::{ApplicationStore, WizardSession, WizardSnapshot};
pub use signal::{CompletionEvent, CompletionSignal, CompletionTransition};
pub use stage::{SEQUENCE, Stage, SubFormPlan, WizardPosition};
pub use subform::SubFormState;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};

// =============================================================================
// RE-EXPORTS: Storage (from storage module)
// =============================================================================

pub use storage::RedbStore;
