//! Error types for the reaper service.
//!
//! Configuration errors are fatal before the first cycle. Store errors are
//! recoverable when a termination fails and fatal when listing fails, which is
//! what [`ReaperError::Retrieval`] carries out of the scheduling loop.

use reaper_pod::SelectorError;
use reaper_rules::RuleError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for reap cycles and the scheduling loop.
pub type ReaperResult<T> = Result<T, ReaperError>;

/// Errors raised while loading options at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An option value could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// A requirement key was set without its value list.
    #[error("{key} is set but {values_key} is not")]
    MissingValues {
        key: &'static str,
        values_key: &'static str,
    },

    /// Neither an API URL override nor in-cluster service variables are set.
    #[error("cannot locate the cluster API: set {0} or run inside a cluster")]
    NoCluster(&'static str),

    /// The schedule expression is malformed.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A rule value is malformed, or no rule is configured.
    #[error(transparent)]
    Rules(#[from] RuleError),

    /// A label or annotation requirement is malformed.
    #[error("invalid requirement: {0}")]
    Selector(#[from] SelectorError),
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A schedule expression that cannot drive the loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid schedule {expression:?}: {reason}")]
pub struct ScheduleError {
    pub expression: String,
    pub reason: String,
}

/// Errors returned by a pod store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with an unexpected status.
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The pod no longer exists.
    #[error("pod {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// An eviction was refused, typically by a disruption budget.
    #[error("eviction of {namespace}/{name} rejected: {message}")]
    EvictionRejected {
        namespace: String,
        name: String,
        message: String,
    },

    /// A response body did not decode.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Service account credentials could not be read.
    #[error("failed to read {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The store is unreachable or refused the operation outright.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort a reap cycle.
#[derive(Debug, Error)]
pub enum ReaperError {
    /// Listing pods failed; no decision can be made without a complete view.
    #[error("failed to retrieve pods: {0}")]
    Retrieval(#[source] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConfigError::invalid("MAX_PODS", "-1", "must be a non-negative integer");
        assert_eq!(
            err.to_string(),
            "invalid value \"-1\" for MAX_PODS: must be a non-negative integer"
        );

        let err = ReaperError::Retrieval(StoreError::Unavailable("connection refused".into()));
        assert_eq!(
            err.to_string(),
            "failed to retrieve pods: store unavailable: connection refused"
        );
    }

    #[test]
    fn test_rule_error_is_transparent() {
        let err: ConfigError = RuleError::NoRulesLoaded.into();
        assert_eq!(err.to_string(), RuleError::NoRulesLoaded.to_string());
    }
}
