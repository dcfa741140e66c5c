//! # Sub-Form State Module
//!
//! Live field values for one sub-form, plus its required-field list.
//! This is the unit the evaluator scores: presence of required fields
//! against the sub-form's weight.
//!
//! Field writes are validated at this boundary. Upload-backed fields
//! move through an explicit lifecycle so a late resolution can never
//! clobber a field the user already changed.

use crate::primitives::{
    MAX_FIELD_NAME_LENGTH, MAX_LIST_VALUES, MAX_REQUIRED_FIELDS, MAX_TEXT_VALUE_LENGTH,
};
use crate::stage::SubFormPlan;
use crate::types::{FieldName, FieldValue, FileRef, TrellisError, UploadState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SUB-FORM STATE
// =============================================================================

/// Field values and required-field list of one sub-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubFormState {
    values: BTreeMap<FieldName, FieldValue>,
    required: Vec<FieldName>,
}

impl SubFormState {
    /// Create an empty sub-form with no required fields.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Create a sub-form with the given required fields.
    ///
    /// Duplicates are dropped, first occurrence wins. Callers pass
    /// blueprint field lists, which are bounded by construction.
    #[must_use]
    pub fn with_required(required: impl IntoIterator<Item = FieldName>) -> Self {
        let mut list: Vec<FieldName> = Vec::new();
        for name in required {
            if !list.contains(&name) {
                list.push(name);
            }
        }
        Self {
            values: BTreeMap::new(),
            required: list,
        }
    }

    /// Create a sub-form from a static blueprint entry.
    #[must_use]
    pub fn from_plan(plan: &SubFormPlan) -> Self {
        Self::with_required(plan.required.iter().map(|name| FieldName::new(*name)))
    }

    /// Add one required field at runtime.
    pub fn require(&mut self, name: FieldName) -> Result<(), TrellisError> {
        validate_field_name(&name)?;
        if self.required.contains(&name) {
            return Ok(());
        }
        if self.required.len() >= MAX_REQUIRED_FIELDS {
            return Err(TrellisError::Validation(format!(
                "required field list exceeds {MAX_REQUIRED_FIELDS} entries"
            )));
        }
        self.required.push(name);
        Ok(())
    }

    /// The required fields, in declaration order.
    #[must_use]
    pub fn required(&self) -> &[FieldName] {
        &self.required
    }

    /// Set a field value after shape validation.
    pub fn set_value(&mut self, name: FieldName, value: FieldValue) -> Result<(), TrellisError> {
        validate_field_name(&name)?;
        validate_field_value(&value)?;
        self.values.insert(name, value);
        Ok(())
    }

    /// Remove a field value entirely.
    pub fn clear_value(&mut self, name: &FieldName) {
        self.values.remove(name);
    }

    /// Look up a field value.
    #[must_use]
    pub fn value(&self, name: &FieldName) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Mark an upload-backed field as in flight.
    ///
    /// The field stops counting as present until the upload resolves.
    pub fn begin_upload(
        &mut self,
        name: FieldName,
        original_name: impl Into<String>,
    ) -> Result<(), TrellisError> {
        validate_field_name(&name)?;
        self.values.insert(
            name,
            FieldValue::Upload {
                state: UploadState::InFlight {
                    original_name: original_name.into(),
                },
            },
        );
        Ok(())
    }

    /// Attach the server-assigned reference to an in-flight upload.
    ///
    /// Rejected unless the field currently holds an in-flight upload,
    /// so a stale resolution cannot overwrite later edits.
    pub fn resolve_upload(&mut self, name: &FieldName, file: FileRef) -> Result<(), TrellisError> {
        match self.values.get_mut(name) {
            Some(FieldValue::Upload {
                state: state @ UploadState::InFlight { .. },
            }) => {
                *state = UploadState::Uploaded { file };
                Ok(())
            }
            _ => Err(TrellisError::Upload(format!(
                "no upload in flight for field '{}'",
                name.as_str()
            ))),
        }
    }

    /// Mark an in-flight upload as failed.
    ///
    /// The field stays absent; the user may retry from the failed state.
    pub fn fail_upload(
        &mut self,
        name: &FieldName,
        message: impl Into<String>,
    ) -> Result<(), TrellisError> {
        match self.values.get_mut(name) {
            Some(FieldValue::Upload {
                state: state @ UploadState::InFlight { .. },
            }) => {
                *state = UploadState::Failed {
                    message: message.into(),
                };
                Ok(())
            }
            _ => Err(TrellisError::Upload(format!(
                "no upload in flight for field '{}'",
                name.as_str()
            ))),
        }
    }

    /// Number of required fields currently present.
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.required
            .iter()
            .filter(|name| self.values.get(name).is_some_and(FieldValue::is_present))
            .count()
    }

    /// Number of required fields.
    #[must_use]
    pub fn required_count(&self) -> usize {
        self.required.len()
    }

    /// Required fields not yet present, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<FieldName> {
        self.required
            .iter()
            .filter(|name| !self.values.get(name).is_some_and(FieldValue::is_present))
            .cloned()
            .collect()
    }

    /// Whether every required field is present.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.filled_count() == self.required.len()
    }

    /// Iterate over all stored field values.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldValue)> {
        self.values.iter()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate_field_name(name: &FieldName) -> Result<(), TrellisError> {
    if name.as_str().is_empty() {
        return Err(TrellisError::Validation(
            "field name cannot be empty".to_string(),
        ));
    }
    if name.as_str().len() > MAX_FIELD_NAME_LENGTH {
        return Err(TrellisError::Validation(format!(
            "field name exceeds {MAX_FIELD_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_field_value(value: &FieldValue) -> Result<(), TrellisError> {
    match value {
        FieldValue::Text { value } => {
            if value.len() > MAX_TEXT_VALUE_LENGTH {
                return Err(TrellisError::Validation(format!(
                    "text value exceeds {MAX_TEXT_VALUE_LENGTH} bytes"
                )));
            }
        }
        FieldValue::List { values } => {
            if values.len() > MAX_LIST_VALUES {
                return Err(TrellisError::Validation(format!(
                    "list exceeds {MAX_LIST_VALUES} entries"
                )));
            }
        }
        FieldValue::Record { entries } => {
            if entries.len() > MAX_LIST_VALUES {
                return Err(TrellisError::Validation(format!(
                    "record exceeds {MAX_LIST_VALUES} entries"
                )));
            }
        }
        FieldValue::Empty | FieldValue::Number { .. } | FieldValue::Flag { .. } => {}
        FieldValue::Upload { .. } => {}
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
