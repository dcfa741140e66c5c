//! # Wizard Controller Module
//!
//! Owns the wizard position and enforces the navigation policy:
//! advancing requires the active stage and everything before it to be
//! complete, jumping backward is unconditional, jumping forward
//! requires every intervening stage complete.
//!
//! Disallowed moves are ordinary values, not errors: the controller
//! returns a denied outcome carrying a user-visible notification and
//! leaves the position untouched.

use crate::progress::StageProgress;
use crate::stage::{SEQUENCE, Stage, WizardPosition};
use crate::types::Notification;
use serde::{Deserialize, Serialize};

// =============================================================================
// NAVIGATION OUTCOMES
// =============================================================================

/// Why a navigation request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenialReason {
    /// The active stage itself is not complete.
    StageIncomplete {
        /// The incomplete stage.
        stage: Stage,
    },
    /// An earlier stage blocks the requested target.
    PrerequisiteIncomplete {
        /// The earliest blocking stage.
        stage: Stage,
    },
    /// The wizard is already in its terminal state.
    AlreadySubmitted,
}

impl DenialReason {
    /// Human-readable denial message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::StageIncomplete { stage } => {
                format!("Cannot continue: {stage} is incomplete")
            }
            Self::PrerequisiteIncomplete { stage } => {
                format!("Cannot skip ahead: {stage} is incomplete")
            }
            Self::AlreadySubmitted => "Application already submitted".to_string(),
        }
    }

    /// The warning the user sees for this denial.
    #[must_use]
    pub fn notification(&self) -> Notification {
        Notification::warning(self.message())
    }
}

/// Result of one navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// The position changed to another stage.
    Moved {
        /// Stage before the move.
        from: Stage,
        /// Stage after the move.
        to: Stage,
    },
    /// The final stage advanced off the end; the wizard is terminal.
    Submitted {
        /// The final stage.
        from: Stage,
    },
    /// The request was refused; the position is unchanged.
    Denied {
        /// Why the request was refused.
        reason: DenialReason,
    },
}

impl NavigationOutcome {
    /// Whether the request was refused.
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// The notification to surface for this outcome, if any.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        match self {
            Self::Moved { .. } => None,
            Self::Submitted { .. } => Some(Notification::info("Application submitted")),
            Self::Denied { reason } => Some(reason.notification()),
        }
    }
}

// =============================================================================
// WIZARD CONTROLLER
// =============================================================================

/// Position holder and navigation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardController {
    position: WizardPosition,
}

impl WizardController {
    /// Start at the first stage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: WizardPosition::Active {
                stage: Stage::first(),
            },
        }
    }

    /// Resume from a stored position.
    #[must_use]
    pub const fn resume(position: WizardPosition) -> Self {
        Self { position }
    }

    /// The current position.
    #[must_use]
    pub const fn position(&self) -> WizardPosition {
        self.position
    }

    /// The active stage, unless submitted.
    #[must_use]
    pub const fn active_stage(&self) -> Option<Stage> {
        self.position.stage()
    }

    /// Advance one stage, or submit from the final stage.
    ///
    /// Requires the active stage and every stage before it to be
    /// complete. Denied requests leave the position untouched.
    pub fn go_next(&mut self, progress: &StageProgress) -> NavigationOutcome {
        let WizardPosition::Active { stage } = self.position else {
            return NavigationOutcome::Denied {
                reason: DenialReason::AlreadySubmitted,
            };
        };

        if let Some(blocker) = progress.first_incomplete() {
            if blocker == stage {
                return NavigationOutcome::Denied {
                    reason: DenialReason::StageIncomplete { stage },
                };
            }
            if blocker.index() < stage.index() {
                return NavigationOutcome::Denied {
                    reason: DenialReason::PrerequisiteIncomplete { stage: blocker },
                };
            }
        }

        match stage.next() {
            Some(next) => {
                self.position = WizardPosition::Active { stage: next };
                NavigationOutcome::Moved {
                    from: stage,
                    to: next,
                }
            }
            None => {
                self.position = WizardPosition::Submitted;
                NavigationOutcome::Submitted { from: stage }
            }
        }
    }

    /// Jump directly to a stage.
    ///
    /// Backward is always allowed; forward requires every stage before
    /// the target to be complete.
    pub fn go_to(&mut self, target: Stage, progress: &StageProgress) -> NavigationOutcome {
        let WizardPosition::Active { stage } = self.position else {
            return NavigationOutcome::Denied {
                reason: DenialReason::AlreadySubmitted,
            };
        };

        if target.index() <= stage.index() {
            self.position = WizardPosition::Active { stage: target };
            return NavigationOutcome::Moved {
                from: stage,
                to: target,
            };
        }

        let blocker = SEQUENCE
            .iter()
            .take(target.index())
            .copied()
            .find(|candidate| !progress.is_complete(*candidate));

        match blocker {
            Some(blocking) if blocking == stage => NavigationOutcome::Denied {
                reason: DenialReason::StageIncomplete { stage },
            },
            Some(blocking) => NavigationOutcome::Denied {
                reason: DenialReason::PrerequisiteIncomplete { stage: blocking },
            },
            None => {
                self.position = WizardPosition::Active { stage: target };
                NavigationOutcome::Moved {
                    from: stage,
                    to: target,
                }
            }
        }
    }
}

impl Default for WizardController {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
