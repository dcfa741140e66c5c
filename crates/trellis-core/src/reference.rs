//! # Reference Data Module
//!
//! Dropdown reference lists (asset types, charge types, agencies) and
//! the source seam that feeds them.
//!
//! Forms stay usable when a live reference backend is down: wrap it in
//! [`FallbackReference`] over the built-in [`StaticReference`] tables.

use crate::types::TrellisError;
use serde::{Deserialize, Serialize};

// =============================================================================
// REFERENCE SETS
// =============================================================================

/// One named reference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSet {
    /// Collateral asset classifications.
    AssetTypes,
    /// Charge classifications.
    ChargeTypes,
    /// Recognised rating agencies.
    RatingAgencies,
    /// Rating outlook codes.
    RatingOutlooks,
    /// Securities depositories.
    Depositories,
}

/// All reference sets.
pub const ALL_REFERENCE_SETS: [ReferenceSet; 5] = [
    ReferenceSet::AssetTypes,
    ReferenceSet::ChargeTypes,
    ReferenceSet::RatingAgencies,
    ReferenceSet::RatingOutlooks,
    ReferenceSet::Depositories,
];

impl ReferenceSet {
    /// Stable identifier, matching the serialized form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AssetTypes => "asset_types",
            Self::ChargeTypes => "charge_types",
            Self::RatingAgencies => "rating_agencies",
            Self::RatingOutlooks => "rating_outlooks",
            Self::Depositories => "depositories",
        }
    }

    /// Parse a stable identifier back into a set.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "asset_types" => Some(Self::AssetTypes),
            "charge_types" => Some(Self::ChargeTypes),
            "rating_agencies" => Some(Self::RatingAgencies),
            "rating_outlooks" => Some(Self::RatingOutlooks),
            "depositories" => Some(Self::Depositories),
            _ => None,
        }
    }
}

/// One selectable entry of a reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    /// Stable code stored in payloads.
    pub code: String,
    /// Label for display.
    pub label: String,
}

impl ReferenceItem {
    /// Create a new reference item.
    #[must_use]
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

// =============================================================================
// SOURCES
// =============================================================================

/// Provider of reference lists.
pub trait ReferenceSource: Send + Sync {
    /// Fetch all items of one set.
    fn fetch(&self, set: ReferenceSet) -> Result<Vec<ReferenceItem>, TrellisError>;
}

const ASSET_TYPES: &[(&str, &str)] = &[
    ("government_security", "Government Security"),
    ("corporate_bond", "Corporate Bond"),
    ("commercial_paper", "Commercial Paper"),
    ("fixed_deposit", "Fixed Deposit"),
    ("real_estate", "Real Estate"),
    ("equity_shares", "Equity Shares"),
];

const CHARGE_TYPES: &[(&str, &str)] = &[
    ("first_ranking_pari_passu", "First Ranking Pari Passu"),
    ("exclusive_charge", "Exclusive Charge"),
    ("subservient_charge", "Subservient Charge"),
    ("residual_charge", "Residual Charge"),
];

const RATING_AGENCIES: &[(&str, &str)] = &[
    ("crisil", "CRISIL"),
    ("icra", "ICRA"),
    ("care", "CARE Ratings"),
    ("india_ratings", "India Ratings"),
    ("brickwork", "Brickwork Ratings"),
    ("acuite", "Acuite Ratings"),
];

const RATING_OUTLOOKS: &[(&str, &str)] = &[
    ("stable", "Stable"),
    ("positive", "Positive"),
    ("negative", "Negative"),
    ("developing", "Developing"),
    ("watch", "Rating Watch"),
];

const DEPOSITORIES: &[(&str, &str)] = &[("nsdl", "NSDL"), ("cdsl", "CDSL")];

/// Built-in reference tables.
///
/// Never fails; serves as the fallback of last resort.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticReference;

impl ReferenceSource for StaticReference {
    fn fetch(&self, set: ReferenceSet) -> Result<Vec<ReferenceItem>, TrellisError> {
        let table = match set {
            ReferenceSet::AssetTypes => ASSET_TYPES,
            ReferenceSet::ChargeTypes => CHARGE_TYPES,
            ReferenceSet::RatingAgencies => RATING_AGENCIES,
            ReferenceSet::RatingOutlooks => RATING_OUTLOOKS,
            ReferenceSet::Depositories => DEPOSITORIES,
        };
        Ok(table
            .iter()
            .map(|(code, label)| ReferenceItem::new(*code, *label))
            .collect())
    }
}

/// Source that falls back to a second source when the first fails.
///
/// The primary's error is discarded; only a failure of both surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackReference<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackReference<P, F> {
    /// Combine a primary source with a fallback.
    #[must_use]
    pub const fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: ReferenceSource, F: ReferenceSource> ReferenceSource for FallbackReference<P, F> {
    fn fetch(&self, set: ReferenceSet) -> Result<Vec<ReferenceItem>, TrellisError> {
        self.primary
            .fetch(set)
            .or_else(|_| self.fallback.fetch(set))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    impl ReferenceSource for FailingSource {
        fn fetch(&self, _set: ReferenceSet) -> Result<Vec<ReferenceItem>, TrellisError> {
            Err(TrellisError::Persistence("backend down".to_string()))
        }
    }

    #[test]
    fn static_tables_cover_every_set() {
        let source = StaticReference;
        for set in ALL_REFERENCE_SETS {
            let items = source.fetch(set).expect("static fetch");
            assert!(!items.is_empty(), "{} must not be empty", set.name());
        }
    }

    #[test]
    fn static_tables_contain_expected_codes() {
        let source = StaticReference;
        let agencies = source.fetch(ReferenceSet::RatingAgencies).expect("fetch");
        assert!(agencies.iter().any(|item| item.code == "crisil"));

        let depositories = source.fetch(ReferenceSet::Depositories).expect("fetch");
        let codes: Vec<&str> = depositories.iter().map(|item| item.code.as_str()).collect();
        assert_eq!(codes, vec!["nsdl", "cdsl"]);
    }

    #[test]
    fn parse_roundtrips_names() {
        for set in ALL_REFERENCE_SETS {
            assert_eq!(ReferenceSet::parse(set.name()), Some(set));
        }
        assert_eq!(ReferenceSet::parse("currencies"), None);
    }

    #[test]
    fn fallback_serves_when_primary_fails() {
        let source = FallbackReference::new(FailingSource, StaticReference);
        let items = source.fetch(ReferenceSet::AssetTypes).expect("fallback");
        assert!(items.iter().any(|item| item.code == "government_security"));
    }

    #[test]
    fn fallback_prefers_primary_when_healthy() {
        struct OneItemSource;
        impl ReferenceSource for OneItemSource {
            fn fetch(&self, _set: ReferenceSet) -> Result<Vec<ReferenceItem>, TrellisError> {
                Ok(vec![ReferenceItem::new("only", "Only")])
            }
        }

        let source = FallbackReference::new(OneItemSource, StaticReference);
        let items = source.fetch(ReferenceSet::AssetTypes).expect("primary");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code, "only");
    }

    #[test]
    fn fallback_propagates_when_both_fail() {
        let source = FallbackReference::new(FailingSource, FailingSource);
        let result = source.fetch(ReferenceSet::AssetTypes);
        assert!(matches!(result, Err(TrellisError::Persistence(_))));
    }
}
