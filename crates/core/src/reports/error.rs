//! Report error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while parsing report parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    /// Invalid date range.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },

    /// Month could not be parsed or is out of range.
    #[error("Invalid month: {0} (expected YYYY-MM)")]
    InvalidMonth(String),

    /// Unknown regime name.
    #[error("Invalid regime: {0} (expected competence or cash)")]
    InvalidRegime(String),
}

impl ReportError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::InvalidMonth(_) => "INVALID_MONTH",
            Self::InvalidRegime(_) => "INVALID_REGIME",
        }
    }
}

impl From<ReportError> for saldo_shared::AppError {
    fn from(err: ReportError) -> Self {
        Self::Validation(err.to_string())
    }
}
