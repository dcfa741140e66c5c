//! # Stage Aggregator Module
//!
//! Folds sub-form contributions into one stage-level completion
//! signal and decides when a typed completion event fires.
//!
//! Summation is saturating and clamped to the full range; the complete
//! flag comes from the exact integer comparison in
//! [`CompletionSignal::from_basis_points`].

use crate::evaluator::Evaluator;
use crate::signal::{CompletionEvent, CompletionSignal, CompletionTransition};
use crate::stage::Stage;
use crate::subform::SubFormState;
use crate::types::Weight;

// =============================================================================
// STAGE AGGREGATOR
// =============================================================================

/// Stateless stage-level aggregator.
pub struct StageAggregator;

impl StageAggregator {
    /// Weighted completion signal of a whole stage.
    #[must_use]
    pub fn stage_signal<'a>(
        parts: impl IntoIterator<Item = (&'a SubFormState, Weight)>,
    ) -> CompletionSignal {
        let mut total: u32 = 0;
        for (state, weight) in parts {
            total = total.saturating_add(u32::from(Evaluator::contribution_bp(state, weight)));
        }
        let clamped = u16::try_from(total).unwrap_or(u16::MAX);
        CompletionSignal::from_basis_points(clamped)
    }

    /// The transition between two signals, if the complete flag flipped.
    #[must_use]
    pub const fn transition(
        previous: CompletionSignal,
        current: CompletionSignal,
    ) -> Option<CompletionTransition> {
        match (previous.complete, current.complete) {
            (false, true) => Some(CompletionTransition::Completed),
            (true, false) => Some(CompletionTransition::Reopened),
            _ => None,
        }
    }

    /// Recompute a stage's signal and emit an event on a flag flip.
    #[must_use]
    pub fn recompute<'a>(
        stage: Stage,
        previous: CompletionSignal,
        parts: impl IntoIterator<Item = (&'a SubFormState, Weight)>,
    ) -> (CompletionSignal, Option<CompletionEvent>) {
        let signal = Self::stage_signal(parts);
        let event = Self::transition(previous, signal).map(|transition| CompletionEvent {
            stage,
            signal,
            transition,
        });
        (signal, event)
    }
}

// =============================================================================
// TESTS
// =============================================================================
