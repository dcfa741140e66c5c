//! # Completion Signal Module
//!
//! The value the wizard computes for each stage: a completion
//! percentage in basis points plus the derived complete flag, and the
//! typed events emitted when that flag flips.
//!
//! All arithmetic is integer basis points. A stage whose sub-forms are
//! all fully filled lands on exactly [`FULL_COMPLETION_BP`], so the
//! complete flag can never be lost to rounding.

use crate::primitives::FULL_COMPLETION_BP;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// COMPLETION SIGNAL
// =============================================================================

/// Completion level of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompletionSignal {
    /// Completion in basis points, 0..=10_000.
    pub basis_points: u16,
    /// Whether the stage counts as complete.
    pub complete: bool,
}

impl CompletionSignal {
    /// Build a signal from raw basis points, clamping to the full range.
    ///
    /// The complete flag is derived: exactly full or above means done.
    #[must_use]
    pub const fn from_basis_points(basis_points: u16) -> Self {
        let clamped = if basis_points > FULL_COMPLETION_BP {
            FULL_COMPLETION_BP
        } else {
            basis_points
        };
        Self {
            basis_points: clamped,
            complete: clamped >= FULL_COMPLETION_BP,
        }
    }

    /// A stage with nothing filled in.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            basis_points: 0,
            complete: false,
        }
    }

    /// A fully complete stage.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            basis_points: FULL_COMPLETION_BP,
            complete: true,
        }
    }

    /// Whole-percent view for display surfaces that round down.
    #[must_use]
    pub const fn percent(self) -> u8 {
        (self.basis_points / 100) as u8
    }

    /// Whether the stage counts as complete.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        self.complete
    }
}

impl fmt::Display for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}%",
            self.basis_points / 100,
            self.basis_points % 100
        )
    }
}

// =============================================================================
// COMPLETION EVENTS
// =============================================================================

/// Direction of a completion flag change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTransition {
    /// The stage crossed from incomplete to complete.
    Completed,
    /// A previously complete stage dropped back below full.
    Reopened,
}

/// Typed event emitted when a stage's completion flag flips.
///
/// Emitted only on actual transitions: recomputing an unchanged stage
/// produces nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// The stage whose flag changed.
    pub stage: Stage,
    /// The signal after the change.
    pub signal: CompletionSignal,
    /// Which way the flag flipped.
    pub transition: CompletionTransition,
}

// =============================================================================
// TESTS
// =============================================================================
