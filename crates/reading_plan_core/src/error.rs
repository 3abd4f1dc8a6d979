//! crates/reading_plan_core/src/error.rs
//!
//! Defines the error type returned by the exposed reading plan operations.

use crate::ports::PortError;

/// Typed failures surfaced to request handlers.
///
/// Degraded conditions (streak failures, unknown timezones, content outages)
/// never appear here; they resolve to defaults inside the service.
#[derive(Debug, thiserror::Error)]
pub enum ReadingPlanError {
    /// Nothing is scheduled: no active plan, no day for a date, or an unknown id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request violates access policy, e.g. reading a future date.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Passage index {index} is out of range for a day with {total} passages")]
    InvalidPassageIndex { index: usize, total: usize },

    /// Represents an error that propagated up from one of the storage ports.
    #[error("Service Port Error: {0}")]
    Port(PortError),
}

impl From<PortError> for ReadingPlanError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => ReadingPlanError::NotFound(what),
            other => ReadingPlanError::Port(other),
        }
    }
}

/// A convenience type alias for `Result<T, ReadingPlanError>`.
pub type ReadingPlanResult<T> = Result<T, ReadingPlanError>;
