//! Rule loading errors.

use thiserror::Error;

/// Result type for rule loading.
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors raised while loading rules. All of them are fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// A configured value could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// Every rule declined to load.
    #[error("no rules were loaded; configure at least one reap rule")]
    NoRulesLoaded,
}

impl RuleError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
