//! # reaper-pod
//!
//! Pod snapshots as seen by pod-reaper, plus the set-based requirements used
//! to scope which pods are considered at all.
//!
//! ## Design Principles
//!
//! - Snapshots are read-only: the reaper never mutates a pod, it only asks the
//!   store to terminate one by identity
//! - The serde shape follows the Kubernetes `v1.Pod` JSON so snapshots can be
//!   decoded straight from an API response
//! - Absent timestamps are `None`, never a zero sentinel

mod error;
mod model;
mod selector;

pub use error::SelectorError;
pub use model::*;
pub use selector::{LabelSelector, Operator, Requirement};
