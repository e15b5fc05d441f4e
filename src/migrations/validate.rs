//! Row rules for the SQL migration.
//!
//! Source rows are checked after cleaning; rows that still break a rule are
//! dropped. Transformed rows get a lighter structural check.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use phaseflow_utils::Row;

pub const COLUMN1_MAX_CHARS: usize = 100;
pub const COLUMN2_MAX_CHARS: usize = 200;
pub const COLUMN3_MAX: f64 = 1000.0;
pub const COLUMN3_TRANSFORMED_MAX: f64 = 2000.0;

static SPECIAL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[!@#$%^&*()_+=\[\]{}|\\:;"'<>,.?/~`]"#).expect("valid special character regex")
});

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("id must be a positive integer, got {0}")]
    InvalidId(String),
    #[error("column1 is required")]
    MissingColumn1,
    #[error("column1 must be a string, got {0}")]
    Column1NotString(String),
    #[error("column1 must be 1 to 100 characters, got {0}")]
    Column1Length(usize),
    #[error("column1 should not contain special characters")]
    Column1SpecialChars,
    #[error("column2 must be at most 200 characters, got {0}")]
    Column2Length(usize),
    #[error("column3 must be between 0 and 1000, got {0}")]
    Column3OutOfRange(f64),
    #[error("created_at '{0}' is not a timestamp")]
    InvalidCreatedAt(String),
    #[error("created_at '{0}' is in the future")]
    FutureCreatedAt(String),
    #[error("column3_transformed is not numeric")]
    Column3TransformedNotNumeric,
    #[error("column3_transformed must be between 0 and 2000, got {0}")]
    Column3TransformedOutOfRange(f64),
}

fn check_id(row: &Row) -> Result<(), ValidationError> {
    match row.get("id").and_then(Value::as_i64) {
        Some(id) if id > 0 => Ok(()),
        _ => Err(ValidationError::InvalidId(
            row.get("id").map_or_else(|| "nothing".to_string(), Value::to_string),
        )),
    }
}

fn column1(row: &Row) -> Result<&str, ValidationError> {
    match row.get("column1") {
        None | Some(Value::Null) => Err(ValidationError::MissingColumn1),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ValidationError::Column1NotString(other.to_string())),
    }
}

/// SQLite writes `YYYY-MM-DD HH:MM:SS` in UTC; RFC 3339 is accepted too.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Check a cleaned source row.
pub fn source_row(row: &Row) -> Result<(), ValidationError> {
    check_id(row)?;

    let column1 = column1(row)?;
    let chars = column1.chars().count();
    if chars == 0 || chars > COLUMN1_MAX_CHARS {
        return Err(ValidationError::Column1Length(chars));
    }
    if SPECIAL_CHARS.is_match(column1) {
        return Err(ValidationError::Column1SpecialChars);
    }

    if let Some(Value::String(column2)) = row.get("column2") {
        let chars = column2.chars().count();
        if chars > COLUMN2_MAX_CHARS {
            return Err(ValidationError::Column2Length(chars));
        }
    }

    if let Some(column3) = row.get("column3").and_then(Value::as_f64) {
        if !(0.0..=COLUMN3_MAX).contains(&column3) {
            return Err(ValidationError::Column3OutOfRange(column3));
        }
    }

    if let Some(Value::String(raw)) = row.get("created_at") {
        let created_at =
            parse_timestamp(raw).ok_or_else(|| ValidationError::InvalidCreatedAt(raw.clone()))?;
        if created_at > Utc::now() {
            return Err(ValidationError::FutureCreatedAt(raw.clone()));
        }
    }
    Ok(())
}

/// Every rule a transformed row breaks; empty when the row is valid.
pub fn transformed_row(row: &Row) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if let Err(e) = check_id(row) {
        errors.push(e);
    }
    if let Err(e) = column1(row) {
        errors.push(e);
    }
    match row.get("column3_transformed") {
        None => {}
        Some(value) => match value.as_f64() {
            Some(v) if !(0.0..=COLUMN3_TRANSFORMED_MAX).contains(&v) => {
                errors.push(ValidationError::Column3TransformedOutOfRange(v))
            }
            Some(_) => {}
            None => errors.push(ValidationError::Column3TransformedNotNumeric),
        },
    }
    errors
}
