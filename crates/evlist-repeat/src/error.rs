//! Error types for repeat-engine operations.

use chrono::Weekday;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum RepeatError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRecurrenceRule(String),

    /// The requested ordinal weekday does not exist in that month
    /// (e.g. a 5th Monday in a month with four).
    #[error("No occurrence {ordinal} of {weekday} in {year}-{month:02}")]
    InvalidOccurrence {
        ordinal: u8,
        weekday: Weekday,
        year: i32,
        month: u32,
    },

    /// Cross-field validation failures, collected rather than reported one at a time.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A persistence call failed; the surrounding transaction was rolled back.
    #[error("Reconciliation storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Access denied for {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Malformed recurrence data: {0}")]
    Blob(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepeatError>;
