//! Reap rules.
//!
//! Each rule is configured independently from a [`ConfigSource`] and decides,
//! for a single pod, whether it should be reaped and why. Rules that have no
//! configuration are inert and left out of the [`RuleSet`]. Key concepts:
//!
//! - **Load**: absent key means inert, unparsable value is fatal
//! - **Evaluate**: rules are combined with a short-circuiting AND
//! - **Explain**: a positive verdict carries one reason per rule, in
//!   registration order
//!
//! # Invariants
//!
//! - A loaded rule is immutable; the same instance serves every pod in every
//!   cycle
//! - Registration order is fixed: chaos, container status, maximum duration,
//!   unready, pod status, pod status phase
//! - A [`RuleSet`] always holds at least one rule

mod chaos;
mod container_status;
pub mod duration;
mod error;
mod max_duration;
mod pod_status;
mod pod_status_phase;
mod rule;
mod ruleset;
mod source;
mod unready;

pub use chaos::Chaos;
pub use container_status::ContainerStatus;
pub use duration::DurationError;
pub use error::{RuleError, RuleResult};
pub use max_duration::MaxDuration;
pub use pod_status::PodStatus;
pub use pod_status_phase::PodStatusPhase;
pub use rule::{ReapRule, Rule};
pub use ruleset::{ReapReason, RuleSet, Verdict};
pub use source::{ConfigSource, EnvSource};
pub use unready::Unready;

/// Probability that any pod is reaped.
pub const ENV_CHAOS_CHANCE: &str = "CHAOS_CHANCE";

/// Comma-separated waiting/terminated container reasons.
pub const ENV_CONTAINER_STATUSES: &str = "CONTAINER_STATUSES";

/// Maximum pod age.
pub const ENV_MAX_DURATION: &str = "MAX_DURATION";

/// Maximum time spent not ready.
pub const ENV_MAX_UNREADY: &str = "MAX_UNREADY";

/// Comma-separated top-level pod reasons.
pub const ENV_POD_STATUSES: &str = "POD_STATUSES";

/// Comma-separated pod phases.
pub const ENV_POD_STATUS_PHASES: &str = "POD_STATUS_PHASES";

/// Split a list value on `,`. Tokens are neither trimmed nor case-folded.
pub(crate) fn split_values(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}
