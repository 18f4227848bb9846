//! Domain error types.

use thiserror::Error;

/// Errors that can occur while building or decoding domain values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A persisted status string does not name a known variant.
    #[error("Unknown {kind}: {value}")]
    UnknownStatus { kind: &'static str, value: String },

    /// A stored numeric column is outside the range the model accepts.
    #[error("Invalid {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}
