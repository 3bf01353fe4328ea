//! Core domain errors.

use thiserror::Error;

/// Core domain errors for taskwrap.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A required context value was absent or empty.
    #[error("Missing required value: {0}")]
    MissingValue(&'static str),

    /// A context value was present but could not be used.
    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Invalid lifecycle transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}
