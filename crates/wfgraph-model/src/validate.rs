//! Raw record → typed entity.
//!
//! Required fields are checked up front so the error names the field; the
//! rest of the record goes through serde, where unknown keys land in the
//! entity's passthrough bag instead of failing.

use std::fmt;

use serde_json::Value;

use crate::entities::{Entity, Recipe, Resource, Weapon};
use crate::manifest::{json_kind, EntityKind};
use crate::{RawRecord, ValidatedNode};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("required field `{field}` must be a string, found {found}")]
    InvalidField {
        field: &'static str,
        found: &'static str,
    },

    #[error("required field `{field}` is empty")]
    EmptyField { field: &'static str },

    #[error("malformed record: {message}")]
    Malformed { message: String },
}

/// Validate a record as a specific entity type.
pub fn validate_as<T: Entity>(raw: RawRecord) -> Result<T, ValidationError> {
    for field in T::REQUIRED {
        check_required(&raw, field)?;
    }
    serde_json::from_value(Value::Object(raw)).map_err(|e| ValidationError::Malformed {
        message: e.to_string(),
    })
}

/// Validate a record as `kind`.
pub fn validate(raw: RawRecord, kind: EntityKind) -> Result<ValidatedNode, ValidationError> {
    Ok(match kind {
        EntityKind::Weapon => ValidatedNode::Weapon(validate_as::<Weapon>(raw)?),
        EntityKind::Resource => ValidatedNode::Resource(validate_as::<Resource>(raw)?),
        EntityKind::Recipe => ValidatedNode::Recipe(validate_as::<Recipe>(raw)?),
    })
}

fn check_required(raw: &RawRecord, field: &'static str) -> Result<(), ValidationError> {
    match raw.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ValidationError::EmptyField { field }),
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(ValidationError::InvalidField {
            field,
            found: json_kind(other),
        }),
    }
}

// ============================================================================
// Batches
// ============================================================================

/// A record that was skipped, with enough context to find it in the export.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub kind: EntityKind,
    /// Position in the manifest array.
    pub index: usize,
    pub unique_name: Option<String>,
    pub error: ValidationError,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} ({}): {}",
            self.kind,
            self.index,
            self.unique_name.as_deref().unwrap_or("unknown"),
            self.error
        )
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedBatch<T> {
    pub entities: Vec<T>,
    pub failures: Vec<RecordFailure>,
}

impl<T> Default for ValidatedBatch<T> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Validate every record; failures are logged and collected, never fatal.
pub fn validate_batch<T: Entity>(records: Vec<RawRecord>) -> ValidatedBatch<T> {
    let mut batch = ValidatedBatch {
        entities: Vec::with_capacity(records.len()),
        failures: Vec::new(),
    };

    for (index, raw) in records.into_iter().enumerate() {
        let unique_name = record_label(&raw);
        match validate_as::<T>(raw) {
            Ok(entity) => batch.entities.push(entity),
            Err(error) => {
                tracing::warn!(
                    kind = %T::KIND,
                    index,
                    unique_name = unique_name.as_deref().unwrap_or("unknown"),
                    error = %error,
                    "validation failed, skipping record"
                );
                batch.failures.push(RecordFailure {
                    kind: T::KIND,
                    index,
                    unique_name,
                    error,
                });
            }
        }
    }
    batch
}

fn record_label(raw: &RawRecord) -> Option<String> {
    ["uniqueName", "name"]
        .iter()
        .find_map(|field| raw.get(*field).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
