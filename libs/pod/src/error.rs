//! Error types for selector construction.

use thiserror::Error;

/// Errors that can occur when building a set-based requirement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The requirement key is empty.
    #[error("requirement key cannot be empty")]
    EmptyKey,

    /// A set-membership operator was given no values.
    #[error("requirement on '{key}' with operator '{operator}' needs at least one value")]
    MissingValues { key: String, operator: &'static str },

    /// The key is not a qualified name (`[prefix/]name`).
    #[error("invalid requirement key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A value is not a valid label value.
    #[error("invalid value '{value}' for requirement on '{key}'")]
    InvalidValue { key: String, value: String },
}
