//! Inclusive date ranges for report filters.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::ReportError;

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day included.
    pub start: NaiveDate,
    /// Last day included.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The calendar month `year-month`.
    pub fn month(year: i32, month: u32) -> Result<Self, ReportError> {
        let invalid = || ReportError::InvalidMonth(format!("{year:04}-{month:02}"));
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(invalid)?;
        Ok(Self { start, end })
    }

    /// Parses `YYYY-MM`.
    pub fn parse_month(raw: &str) -> Result<Self, ReportError> {
        let invalid = || ReportError::InvalidMonth(raw.to_string());
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::month(year, month).map_err(|_| invalid())
    }

    /// Returns true if `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Label of the month the range starts in (`YYYY-MM`).
    #[must_use]
    pub fn month_label(&self) -> String {
        format!("{:04}-{:02}", self.start.year(), self.start.month())
    }
}

/// `None` means unbounded.
#[must_use]
pub fn in_range(range: Option<&DateRange>, date: NaiveDate) -> bool {
    range.is_none_or(|r| r.contains(date))
}
