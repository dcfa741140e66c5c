//! # Stage Progress Module
//!
//! The per-stage completion ledger the navigation gate reads, plus the
//! read-only wizard state handed to progress indicator surfaces.
//!
//! Progress is always derived from live sub-form state; it is never
//! persisted and never edited directly.

use crate::aggregator::StageAggregator;
use crate::primitives::FULL_COMPLETION_BP;
use crate::signal::{CompletionEvent, CompletionSignal};
use crate::stage::{SEQUENCE, Stage, WizardPosition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// STAGE PROGRESS
// =============================================================================

/// Completion signals for every stage of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    signals: BTreeMap<Stage, CompletionSignal>,
}

impl StageProgress {
    /// Fresh progress: every stage present, every stage empty.
    #[must_use]
    pub fn new() -> Self {
        let mut signals = BTreeMap::new();
        for stage in SEQUENCE {
            signals.insert(stage, CompletionSignal::empty());
        }
        Self { signals }
    }

    /// The current signal of a stage.
    #[must_use]
    pub fn signal(&self, stage: Stage) -> CompletionSignal {
        self.signals
            .get(&stage)
            .copied()
            .unwrap_or_else(CompletionSignal::empty)
    }

    /// Store a freshly computed signal, emitting an event on a flip.
    pub fn apply(&mut self, stage: Stage, signal: CompletionSignal) -> Option<CompletionEvent> {
        let previous = self.signal(stage);
        self.signals.insert(stage, signal);
        StageAggregator::transition(previous, signal).map(|transition| CompletionEvent {
            stage,
            signal,
            transition,
        })
    }

    /// Whether a stage is complete.
    #[must_use]
    pub fn is_complete(&self, stage: Stage) -> bool {
        self.signal(stage).is_complete()
    }

    /// Whether every stage before `target` is complete.
    #[must_use]
    pub fn prerequisites_met(&self, target: Stage) -> bool {
        SEQUENCE
            .iter()
            .take(target.index())
            .all(|stage| self.is_complete(*stage))
    }

    /// The earliest incomplete stage, if any.
    #[must_use]
    pub fn first_incomplete(&self) -> Option<Stage> {
        SEQUENCE
            .iter()
            .copied()
            .find(|stage| !self.is_complete(*stage))
    }

    /// Mean completion across all stages, in basis points.
    #[must_use]
    pub fn overall_basis_points(&self) -> u16 {
        let total: u32 = SEQUENCE
            .iter()
            .map(|stage| u32::from(self.signal(*stage).basis_points))
            .sum();
        let mean = total / SEQUENCE.len() as u32;
        u16::try_from(mean).unwrap_or(FULL_COMPLETION_BP)
    }

    /// Iterate signals in stage order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, CompletionSignal)> + '_ {
        SEQUENCE.iter().map(|stage| (*stage, self.signal(*stage)))
    }
}

impl Default for StageProgress {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// WIZARD STATE READ-MODEL
// =============================================================================

/// Read-only snapshot of wizard progress for display surfaces.
///
/// Indicators render from this; they never mutate the wizard through
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    /// Current wizard position.
    pub position: WizardPosition,
    /// Per-stage completion signals.
    pub stages: BTreeMap<Stage, CompletionSignal>,
    /// Stages with a committed payload, in stage order.
    pub committed: Vec<Stage>,
    /// Mean completion across all stages.
    pub overall_basis_points: u16,
}

// =============================================================================
// TESTS
// =============================================================================
