//! # Stage Module
//!
//! The fixed five-stage issuance sequence, the per-stage sub-form
//! blueprints with their weights, and the wizard position type.
//!
//! Stage order is total and static. Blueprints are const tables: the
//! weights of one stage's sub-forms always sum to
//! [`FULL_COMPLETION_BP`](crate::primitives::FULL_COMPLETION_BP).

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STAGE
// =============================================================================

/// One stage of the issuance wizard, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fund position and liquidity details.
    FundPosition,
    /// Collateral asset schedule and charge details.
    CollateralAssets,
    /// Credit rating details across agencies.
    CreditRatings,
    /// Authorised signatories and board resolution.
    Signatories,
    /// ISIN activation details.
    IsinActivation,
}

/// All stages in wizard order.
pub const SEQUENCE: [Stage; 5] = [
    Stage::FundPosition,
    Stage::CollateralAssets,
    Stage::CreditRatings,
    Stage::Signatories,
    Stage::IsinActivation,
];

impl Stage {
    /// Stable identifier, matching the serialized form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FundPosition => "fund_position",
            Self::CollateralAssets => "collateral_assets",
            Self::CreditRatings => "credit_ratings",
            Self::Signatories => "signatories",
            Self::IsinActivation => "isin_activation",
        }
    }

    /// Human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::FundPosition => "Fund Position",
            Self::CollateralAssets => "Collateral Assets",
            Self::CreditRatings => "Credit Ratings",
            Self::Signatories => "Signatories",
            Self::IsinActivation => "ISIN Activation",
        }
    }

    /// Zero-based position in the sequence.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::FundPosition => 0,
            Self::CollateralAssets => 1,
            Self::CreditRatings => 2,
            Self::Signatories => 3,
            Self::IsinActivation => 4,
        }
    }

    /// The stage after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::FundPosition => Some(Self::CollateralAssets),
            Self::CollateralAssets => Some(Self::CreditRatings),
            Self::CreditRatings => Some(Self::Signatories),
            Self::Signatories => Some(Self::IsinActivation),
            Self::IsinActivation => None,
        }
    }

    /// The stage before this one, if any.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::FundPosition => None,
            Self::CollateralAssets => Some(Self::FundPosition),
            Self::CreditRatings => Some(Self::CollateralAssets),
            Self::Signatories => Some(Self::CreditRatings),
            Self::IsinActivation => Some(Self::Signatories),
        }
    }

    /// The first stage of the wizard.
    #[must_use]
    pub const fn first() -> Self {
        Self::FundPosition
    }

    /// The final stage of the wizard.
    #[must_use]
    pub const fn last() -> Self {
        Self::IsinActivation
    }

    /// Parse a stable identifier back into a stage.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "fund_position" => Some(Self::FundPosition),
            "collateral_assets" => Some(Self::CollateralAssets),
            "credit_ratings" => Some(Self::CreditRatings),
            "signatories" => Some(Self::Signatories),
            "isin_activation" => Some(Self::IsinActivation),
            _ => None,
        }
    }

    /// Sub-form layout of this stage.
    #[must_use]
    pub const fn blueprint(self) -> &'static [SubFormPlan] {
        match self {
            Self::FundPosition => FUND_POSITION_PLAN,
            Self::CollateralAssets => COLLATERAL_ASSETS_PLAN,
            Self::CreditRatings => CREDIT_RATINGS_PLAN,
            Self::Signatories => SIGNATORIES_PLAN,
            Self::IsinActivation => ISIN_ACTIVATION_PLAN,
        }
    }

    /// The sub-form a field belongs to, by blueprint lookup.
    ///
    /// Field names are unique within a stage, across required and
    /// optional lists alike.
    #[must_use]
    pub fn subform_for_field(self, field: &str) -> Option<&'static str> {
        self.blueprint()
            .iter()
            .find(|plan| plan.required.contains(&field) || plan.optional.contains(&field))
            .map(|plan| plan.id)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.index() + 1, self.title())
    }
}

// =============================================================================
// SUB-FORM BLUEPRINTS
// =============================================================================

/// Static layout of one sub-form: identity, weight, and field lists.
///
/// Only `required` fields feed completion; `optional` fields are
/// carried for display and pre-fill but never gate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubFormPlan {
    /// Stable sub-form identifier.
    pub id: &'static str,
    /// Weight within the stage, in basis points.
    pub weight_bp: u16,
    /// Fields that must be present for full contribution.
    pub required: &'static [&'static str],
    /// Fields tracked but not counted.
    pub optional: &'static [&'static str],
}

const FUND_POSITION_PLAN: &[SubFormPlan] = &[SubFormPlan {
    id: "fund_position",
    weight_bp: 10_000,
    required: &["fund_name", "total_aum", "liquid_assets", "as_of_date"],
    optional: &["custodian"],
}];

const COLLATERAL_ASSETS_PLAN: &[SubFormPlan] = &[
    SubFormPlan {
        id: "asset_schedule",
        weight_bp: 5_000,
        required: &["assets"],
        optional: &[],
    },
    SubFormPlan {
        id: "charge_details",
        weight_bp: 5_000,
        required: &["charge_type", "charge_holder"],
        optional: &["ranking"],
    },
];

const CREDIT_RATINGS_PLAN: &[SubFormPlan] = &[
    SubFormPlan {
        id: "agency_rating",
        weight_bp: 3_500,
        required: &["agency_name", "rating_grade"],
        optional: &[],
    },
    SubFormPlan {
        id: "instrument_rating",
        weight_bp: 3_500,
        required: &["instrument_grade", "rated_amount"],
        optional: &[],
    },
    SubFormPlan {
        id: "rating_outlook",
        weight_bp: 3_000,
        required: &["outlook", "review_date"],
        optional: &[],
    },
];

const SIGNATORIES_PLAN: &[SubFormPlan] = &[
    SubFormPlan {
        id: "authorised_signatories",
        weight_bp: 5_000,
        required: &["signatories"],
        optional: &[],
    },
    SubFormPlan {
        id: "board_resolution",
        weight_bp: 5_000,
        required: &["resolution_document", "resolution_date"],
        optional: &[],
    },
];

const ISIN_ACTIVATION_PLAN: &[SubFormPlan] = &[SubFormPlan {
    id: "isin_activation",
    weight_bp: 10_000,
    required: &["isin_code", "activation_date", "depository"],
    optional: &[],
}];

// =============================================================================
// WIZARD POSITION
// =============================================================================

/// Where the wizard currently stands.
///
/// `Submitted` is terminal: no navigation or editing is possible past
/// the final advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPosition {
    /// A stage is active and editable.
    Active {
        /// The active stage.
        stage: Stage,
    },
    /// The wizard ran off the end of the sequence.
    Submitted,
}

impl WizardPosition {
    /// The active stage, unless submitted.
    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Active { stage } => Some(stage),
            Self::Submitted => None,
        }
    }

    /// Whether the wizard reached the terminal state.
    #[must_use]
    pub const fn is_submitted(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl Default for WizardPosition {
    fn default() -> Self {
        Self::Active {
            stage: Stage::first(),
        }
    }
}

impl fmt::Display for WizardPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { stage } => write!(f, "{stage}"),
            Self::Submitted => write!(f, "Submitted"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
