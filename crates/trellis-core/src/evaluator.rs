//! # Completion Evaluator Module
//!
//! Scores one sub-form against its weight: the earned contribution is
//! the weight scaled by the fraction of required fields present.
//!
//! Pure integer arithmetic. A fully filled sub-form earns exactly its
//! weight, with no rounding shortfall, because the division collapses
//! to `weight * total / total`.

use crate::subform::SubFormState;
use crate::types::Weight;
use serde::{Deserialize, Serialize};

// =============================================================================
// CONTRIBUTION
// =============================================================================

/// Detailed score of one sub-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// The sub-form's weight in basis points.
    pub weight_bp: u16,
    /// Required fields currently present.
    pub filled: usize,
    /// Total required fields.
    pub required: usize,
    /// Earned contribution in basis points.
    pub earned_bp: u16,
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Stateless completion evaluator.
///
/// Same sub-form state and weight always produce the same
/// contribution, independent of entry order or call history.
pub struct Evaluator;

impl Evaluator {
    /// Earned contribution of a sub-form, in basis points.
    ///
    /// A sub-form with no required fields earns its full weight:
    /// nothing is missing from it.
    #[must_use]
    pub fn contribution_bp(state: &SubFormState, weight: Weight) -> u16 {
        let required = state.required_count();
        if required == 0 {
            return weight.bp();
        }
        let filled = state.filled_count();
        let earned = (u32::from(weight.bp()) * filled as u32) / required as u32;
        earned as u16
    }

    /// Full contribution detail, for progress display surfaces.
    #[must_use]
    pub fn contribution(state: &SubFormState, weight: Weight) -> Contribution {
        Contribution {
            weight_bp: weight.bp(),
            filled: state.filled_count(),
            required: state.required_count(),
            earned_bp: Self::contribution_bp(state, weight),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
