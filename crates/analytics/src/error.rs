//! Analytics error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while computing analytics.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The order ledger could not be read.
    #[error("Store error: {0}")]
    Store(#[from] order_store::StoreError),

    /// The end of a date range lies before its start.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A date range covers more days than a single query may.
    #[error("Date range of {days} days exceeds the limit of {max} days")]
    RangeTooLong { days: i64, max: i64 },
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
