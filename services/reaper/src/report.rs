//! Reap outcome reporting.
//!
//! The reaper reports per-pod outcomes through an injected [`ReapLog`] rather
//! than logging them itself, so tests can capture exactly what was decided.

use std::sync::{Mutex, PoisonError};

use reaper_pod::Pod;
use reaper_rules::ReapReason;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::ReapAction;

/// Something the reaper did, or declined to do, to one pod.
#[derive(Debug, Clone, Copy)]
pub enum ReapEvent<'a> {
    /// The pod was deleted or evicted.
    Reaped {
        pod: &'a Pod,
        action: ReapAction,
        reasons: &'a [ReapReason],
    },

    /// Dry run: the pod would have been reaped.
    WouldReap {
        pod: &'a Pod,
        reasons: &'a [ReapReason],
    },

    /// The pod matched but the per-cycle cap was already reached.
    CapReached { pod: &'a Pod, cap: usize },

    /// The termination request failed. The cycle carries on.
    Failed {
        pod: &'a Pod,
        action: ReapAction,
        error: &'a StoreError,
    },
}

/// Receives reap outcomes.
pub trait ReapLog: Send + Sync {
    fn record(&self, event: ReapEvent<'_>);
}

fn join_reasons(reasons: &[ReapReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Emits each outcome as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReapLog;

impl ReapLog for TracingReapLog {
    fn record(&self, event: ReapEvent<'_>) {
        match event {
            ReapEvent::Reaped {
                pod,
                action,
                reasons,
            } => info!(
                namespace = %pod.namespace(),
                pod = %pod.name(),
                action = %action,
                reasons = %join_reasons(reasons),
                "Pod reaped"
            ),
            ReapEvent::WouldReap { pod, reasons } => info!(
                namespace = %pod.namespace(),
                pod = %pod.name(),
                reasons = %join_reasons(reasons),
                dry_run = true,
                "Pod would be reaped"
            ),
            ReapEvent::CapReached { pod, cap } => debug!(
                namespace = %pod.namespace(),
                pod = %pod.name(),
                max_pods = cap,
                "Skipping pod, cycle cap reached"
            ),
            ReapEvent::Failed { pod, action, error } => warn!(
                namespace = %pod.namespace(),
                pod = %pod.name(),
                action = %action,
                error = %error,
                "Failed to reap pod"
            ),
        }
    }
}

/// Owned copy of a [`ReapEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapRecord {
    Reaped {
        pod: String,
        action: ReapAction,
        reasons: Vec<ReapReason>,
    },
    WouldReap {
        pod: String,
        reasons: Vec<ReapReason>,
    },
    CapReached {
        pod: String,
        cap: usize,
    },
    Failed {
        pod: String,
        action: ReapAction,
        error: String,
    },
}

impl ReapRecord {
    /// `namespace/name` of the pod concerned.
    pub fn pod(&self) -> &str {
        match self {
            Self::Reaped { pod, .. }
            | Self::WouldReap { pod, .. }
            | Self::CapReached { pod, .. }
            | Self::Failed { pod, .. } => pod,
        }
    }
}

impl From<ReapEvent<'_>> for ReapRecord {
    fn from(event: ReapEvent<'_>) -> Self {
        match event {
            ReapEvent::Reaped {
                pod,
                action,
                reasons,
            } => Self::Reaped {
                pod: pod.key(),
                action,
                reasons: reasons.to_vec(),
            },
            ReapEvent::WouldReap { pod, reasons } => Self::WouldReap {
                pod: pod.key(),
                reasons: reasons.to_vec(),
            },
            ReapEvent::CapReached { pod, cap } => Self::CapReached {
                pod: pod.key(),
                cap,
            },
            ReapEvent::Failed { pod, action, error } => Self::Failed {
                pod: pod.key(),
                action,
                error: error.to_string(),
            },
        }
    }
}

/// Keeps every outcome in memory.
#[derive(Debug, Default)]
pub struct MemoryReapLog {
    records: Mutex<Vec<ReapRecord>>,
}

impl MemoryReapLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReapRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReapLog for MemoryReapLog {
    fn record(&self, event: ReapEvent<'_>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }
}
