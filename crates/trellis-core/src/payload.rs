//! # Stage Payload Module
//!
//! The typed payload each stage submits for persistence: a tagged sum
//! type, one variant per stage, validated at the save boundary.
//!
//! Validation here is shape-level only: required parts present, sizes
//! within caps, identifiers well-formed. Business rules beyond shape
//! belong to the backend.

use crate::primitives::{
    ISIN_LENGTH, MAX_SCHEDULE_ROWS, MAX_SIGNATORIES, MAX_TEXT_VALUE_LENGTH,
};
use crate::stage::Stage;
use crate::types::{FieldName, FieldValue, FileRef, TrellisError};
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE DETAIL STRUCTS
// =============================================================================

/// Fund position and liquidity figures. Amounts are minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundPositionDetails {
    /// Legal fund name.
    pub fund_name: String,
    /// Total assets under management, minor units.
    pub total_aum_minor: i64,
    /// Liquid portion of the assets, minor units.
    pub liquid_assets_minor: i64,
    /// Reporting date for the figures.
    pub as_of_date: String,
    /// Custodian bank, if appointed.
    #[serde(default)]
    pub custodian: Option<String>,
}

/// One row of the collateral asset schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralAsset {
    /// Asset classification code.
    pub asset_type: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Asset value, minor units.
    pub value_minor: i64,
    /// Date of the valuation.
    pub valuation_date: String,
}

/// Charge created over the collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeDetails {
    /// Charge classification code.
    pub charge_type: String,
    /// Entity holding the charge.
    pub charge_holder: String,
    /// Ranking of the charge, if stated.
    #[serde(default)]
    pub ranking: Option<String>,
}

/// Collateral stage payload: schedule plus charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralDetails {
    /// Asset schedule rows.
    #[serde(default)]
    pub assets: Vec<CollateralAsset>,
    /// Charge over the schedule.
    pub charge: ChargeDetails,
}

/// Rating assigned by an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyRating {
    /// Agency code.
    pub agency_name: String,
    /// Grade awarded.
    pub rating_grade: String,
}

/// Rating of the instrument itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRating {
    /// Instrument grade.
    pub instrument_grade: String,
    /// Amount covered by the rating, minor units.
    pub rated_amount_minor: i64,
}

/// Forward-looking outlook on the rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingOutlook {
    /// Outlook code.
    pub outlook: String,
    /// Next scheduled review date.
    pub review_date: String,
}

/// Credit ratings stage payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRatingDetails {
    /// Agency rating.
    pub agency: AgencyRating,
    /// Instrument rating.
    pub instrument: InstrumentRating,
    /// Rating outlook.
    pub outlook: RatingOutlook,
}

/// One authorised signatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatory {
    /// Full name.
    pub name: String,
    /// Designation within the issuer.
    pub designation: String,
    /// Contact email.
    pub email: String,
}

/// Board resolution authorising the signatories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardResolution {
    /// Uploaded resolution document.
    pub document: FileRef,
    /// Date the resolution was passed.
    pub resolution_date: String,
}

/// Signatories stage payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatoriesDetails {
    /// Authorised signatories.
    pub signatories: Vec<Signatory>,
    /// Board resolution backing them.
    pub resolution: BoardResolution,
}

/// ISIN activation stage payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsinActivationDetails {
    /// Twelve-character ISIN.
    pub isin_code: String,
    /// Activation date.
    pub activation_date: String,
    /// Depository code.
    pub depository: String,
}

// =============================================================================
// STAGE PAYLOAD
// =============================================================================

/// Payload submitted when saving one stage.
///
/// The variant names the stage, so a payload can never be committed
/// under the wrong one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePayload {
    /// Fund position details.
    FundPosition(FundPositionDetails),
    /// Collateral schedule and charge.
    CollateralAssets(CollateralDetails),
    /// Credit ratings.
    CreditRatings(CreditRatingDetails),
    /// Signatories and board resolution.
    Signatories(SignatoriesDetails),
    /// ISIN activation.
    IsinActivation(IsinActivationDetails),
}

impl StagePayload {
    /// The stage this payload belongs to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::FundPosition(_) => Stage::FundPosition,
            Self::CollateralAssets(_) => Stage::CollateralAssets,
            Self::CreditRatings(_) => Stage::CreditRatings,
            Self::Signatories(_) => Stage::Signatories,
            Self::IsinActivation(_) => Stage::IsinActivation,
        }
    }

    /// Stable stage identifier.
    #[must_use]
    pub const fn stage_name(&self) -> &'static str {
        self.stage().name()
    }

    /// Shape-validate the payload.
    pub fn validate(&self) -> Result<(), TrellisError> {
        match self {
            Self::FundPosition(details) => {
                require_text("fund_name", &details.fund_name)?;
                require_non_negative("total_aum", details.total_aum_minor)?;
                require_non_negative("liquid_assets", details.liquid_assets_minor)?;
                require_text("as_of_date", &details.as_of_date)?;
                Ok(())
            }
            Self::CollateralAssets(details) => {
                if details.assets.is_empty() {
                    return Err(TrellisError::Validation(
                        "asset schedule cannot be empty".to_string(),
                    ));
                }
                if details.assets.len() > MAX_SCHEDULE_ROWS {
                    return Err(TrellisError::Validation(format!(
                        "asset schedule exceeds {MAX_SCHEDULE_ROWS} rows"
                    )));
                }
                for asset in &details.assets {
                    require_text("asset_type", &asset.asset_type)?;
                    require_text("valuation_date", &asset.valuation_date)?;
                    require_non_negative("asset value", asset.value_minor)?;
                }
                require_text("charge_type", &details.charge.charge_type)?;
                require_text("charge_holder", &details.charge.charge_holder)?;
                Ok(())
            }
            Self::CreditRatings(details) => {
                require_text("agency_name", &details.agency.agency_name)?;
                require_text("rating_grade", &details.agency.rating_grade)?;
                require_text("instrument_grade", &details.instrument.instrument_grade)?;
                require_non_negative("rated_amount", details.instrument.rated_amount_minor)?;
                require_text("outlook", &details.outlook.outlook)?;
                require_text("review_date", &details.outlook.review_date)?;
                Ok(())
            }
            Self::Signatories(details) => {
                if details.signatories.is_empty() {
                    return Err(TrellisError::Validation(
                        "at least one signatory is required".to_string(),
                    ));
                }
                if details.signatories.len() > MAX_SIGNATORIES {
                    return Err(TrellisError::Validation(format!(
                        "signatory list exceeds {MAX_SIGNATORIES} entries"
                    )));
                }
                for signatory in &details.signatories {
                    require_text("signatory name", &signatory.name)?;
                    require_text("designation", &signatory.designation)?;
                    if !signatory.email.contains('@') {
                        return Err(TrellisError::Validation(format!(
                            "invalid email for signatory '{}'",
                            signatory.name
                        )));
                    }
                }
                require_text("resolution document id", &details.resolution.document.file_id)?;
                require_text("resolution_date", &details.resolution.resolution_date)?;
                Ok(())
            }
            Self::IsinActivation(details) => {
                validate_isin(&details.isin_code)?;
                require_text("activation_date", &details.activation_date)?;
                require_text("depository", &details.depository)?;
                Ok(())
            }
        }
    }

    /// Flatten the payload into form fields for pre-fill.
    ///
    /// Field names match the blueprint of the payload's stage, so a
    /// committed payload mirrors back as a fully complete stage.
    #[must_use]
    pub fn to_fields(&self) -> Vec<(FieldName, FieldValue)> {
        match self {
            Self::FundPosition(details) => {
                let mut fields = vec![
                    (
                        FieldName::new("fund_name"),
                        FieldValue::text(details.fund_name.clone()),
                    ),
                    (
                        FieldName::new("total_aum"),
                        FieldValue::number(details.total_aum_minor),
                    ),
                    (
                        FieldName::new("liquid_assets"),
                        FieldValue::number(details.liquid_assets_minor),
                    ),
                    (
                        FieldName::new("as_of_date"),
                        FieldValue::text(details.as_of_date.clone()),
                    ),
                ];
                if let Some(custodian) = &details.custodian {
                    fields.push((
                        FieldName::new("custodian"),
                        FieldValue::text(custodian.clone()),
                    ));
                }
                fields
            }
            Self::CollateralAssets(details) => {
                let rows = details
                    .assets
                    .iter()
                    .map(|asset| format!("{}: {}", asset.asset_type, asset.value_minor));
                let mut fields = vec![
                    (FieldName::new("assets"), FieldValue::list(rows)),
                    (
                        FieldName::new("charge_type"),
                        FieldValue::text(details.charge.charge_type.clone()),
                    ),
                    (
                        FieldName::new("charge_holder"),
                        FieldValue::text(details.charge.charge_holder.clone()),
                    ),
                ];
                if let Some(ranking) = &details.charge.ranking {
                    fields.push((
                        FieldName::new("ranking"),
                        FieldValue::text(ranking.clone()),
                    ));
                }
                fields
            }
            Self::CreditRatings(details) => vec![
                (
                    FieldName::new("agency_name"),
                    FieldValue::text(details.agency.agency_name.clone()),
                ),
                (
                    FieldName::new("rating_grade"),
                    FieldValue::text(details.agency.rating_grade.clone()),
                ),
                (
                    FieldName::new("instrument_grade"),
                    FieldValue::text(details.instrument.instrument_grade.clone()),
                ),
                (
                    FieldName::new("rated_amount"),
                    FieldValue::number(details.instrument.rated_amount_minor),
                ),
                (
                    FieldName::new("outlook"),
                    FieldValue::text(details.outlook.outlook.clone()),
                ),
                (
                    FieldName::new("review_date"),
                    FieldValue::text(details.outlook.review_date.clone()),
                ),
            ],
            Self::Signatories(details) => {
                let entries = details
                    .signatories
                    .iter()
                    .map(|signatory| format!("{} <{}>", signatory.name, signatory.email));
                vec![
                    (FieldName::new("signatories"), FieldValue::list(entries)),
                    (
                        FieldName::new("resolution_document"),
                        FieldValue::uploaded(details.resolution.document.clone()),
                    ),
                    (
                        FieldName::new("resolution_date"),
                        FieldValue::text(details.resolution.resolution_date.clone()),
                    ),
                ]
            }
            Self::IsinActivation(details) => vec![
                (
                    FieldName::new("isin_code"),
                    FieldValue::text(details.isin_code.clone()),
                ),
                (
                    FieldName::new("activation_date"),
                    FieldValue::text(details.activation_date.clone()),
                ),
                (
                    FieldName::new("depository"),
                    FieldValue::text(details.depository.clone()),
                ),
            ],
        }
    }
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn require_text(field: &str, value: &str) -> Result<(), TrellisError> {
    if value.is_empty() {
        return Err(TrellisError::Validation(format!("{field} is required")));
    }
    if value.len() > MAX_TEXT_VALUE_LENGTH {
        return Err(TrellisError::Validation(format!(
            "{field} exceeds {MAX_TEXT_VALUE_LENGTH} bytes"
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> Result<(), TrellisError> {
    if value < 0 {
        return Err(TrellisError::Validation(format!(
            "{field} cannot be negative"
        )));
    }
    Ok(())
}

fn validate_isin(code: &str) -> Result<(), TrellisError> {
    if code.len() != ISIN_LENGTH {
        return Err(TrellisError::Validation(format!(
            "ISIN must be exactly {ISIN_LENGTH} characters"
        )));
    }
    if !code.bytes().all(|byte| byte.is_ascii_alphanumeric()) {
        return Err(TrellisError::Validation(
            "ISIN must be alphanumeric".to_string(),
        ));
    }
    if !code.bytes().take(2).all(|byte| byte.is_ascii_uppercase()) {
        return Err(TrellisError::Validation(
            "ISIN must start with a two-letter country code".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
