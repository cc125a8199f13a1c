//! Boundary input schemas
//!
//! This module defines the shapes accepted from collaborators and users before
//! anything enters the analysis pipeline: tagged daily health records from the
//! health-data source and mood check-in submissions. Everything is validated
//! here; malformed input is rejected whole, never partially processed.

mod check_in;
mod health_record;

pub use check_in::*;
pub use health_record::*;

use serde::de::DeserializeOwned;

/// Validation errors for boundary input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field {field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Field {field} exceeds {max} characters")]
    TooLong { field: String, max: usize },

    #[error("Invalid time range in {0}: end precedes start")]
    InvalidTimeRange(String),

    #[error("Malformed record on line {line}: {message}")]
    Malformed { line: usize, message: String },
}

pub(crate) fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}

/// Parse NDJSON (newline-delimited JSON), one record per line
pub fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, ValidationError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<T>(trimmed).map_err(|e| ValidationError::Malformed {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Parse a JSON array of records
pub fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, ValidationError> {
    serde_json::from_str(json).map_err(|e| ValidationError::Malformed {
        line: e.line(),
        message: e.to_string(),
    })
}

/// Result of validating one record in a batch
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub error: ValidationError,
}

/// Validate a batch, returning only the failures
pub fn validate_batch<T>(
    records: &[T],
    validate: impl Fn(&T) -> Result<(), ValidationError>,
) -> Vec<ValidationResult> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            validate(record)
                .err()
                .map(|error| ValidationResult { index, error })
        })
        .collect()
}
