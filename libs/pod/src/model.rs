//! Pod snapshot types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation carrying the controller's deletion cost for a pod.
pub const DELETION_COST_ANNOTATION: &str = "controller.kubernetes.io/pod-deletion-cost";

/// Condition type reporting pod readiness.
pub const READY_CONDITION: &str = "Ready";

/// A pod snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub status: PodStatus,
}

/// Identity and metadata of a pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Observed status of a pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PodPhase>,

    /// Top-level reason, e.g. `Evicted`.
    #[serde(default)]
    pub reason: String,

    /// Absent until the pod has been scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,

    #[serde(default)]
    pub init_container_statuses: Vec<ContainerStatus>,

    #[serde(default)]
    pub conditions: Vec<PodCondition>,
}

/// Lifecycle phase of a pod.
///
/// Unknown phase strings are kept verbatim in `Other` so that matching stays
/// an exact string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    Other(String),
}

impl PodPhase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PodPhase {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Unknown" => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for PodPhase {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<PodPhase> for String {
    fn from(phase: PodPhase) -> Self {
        match phase {
            PodPhase::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single (init) container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub state: ContainerState,
}

/// Container state. At most one of the fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<ContainerStateWaiting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<ContainerStateRunning>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated: Option<ContainerStateTerminated>,
}

impl ContainerState {
    /// A waiting container with the given reason.
    pub fn waiting(reason: impl Into<String>) -> Self {
        Self {
            waiting: Some(ContainerStateWaiting {
                reason: reason.into(),
            }),
            ..Default::default()
        }
    }

    /// A terminated container with the given reason.
    pub fn terminated(reason: impl Into<String>) -> Self {
        Self {
            terminated: Some(ContainerStateTerminated {
                reason: reason.into(),
                exit_code: 0,
            }),
            ..Default::default()
        }
    }

    /// A running container.
    pub fn running() -> Self {
        Self {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        }
    }

    /// Reason of a waiting or terminated state. Running states have none.
    pub fn reason(&self) -> Option<&str> {
        if let Some(waiting) = &self.waiting {
            return Some(&waiting.reason);
        }
        self.terminated.as_ref().map(|t| t.reason.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateWaiting {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateRunning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateTerminated {
    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub exit_code: i32,
}

/// A pod condition such as `Ready`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub condition_type: String,

    /// `True`, `False` or `Unknown`, kept as the raw string.
    #[serde(default)]
    pub status: String,

    /// `None` when the API left the timestamp unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Pod {
    /// Create an empty pod snapshot with the given identity.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            status: PodStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// `namespace/name`, used in log fields.
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.status.start_time = Some(start_time);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// The `Ready` condition, if reported.
    pub fn ready_condition(&self) -> Option<&PodCondition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == READY_CONDITION)
    }

    /// Deletion cost from the controller annotation.
    ///
    /// Missing or unparsable annotations count as 0, the controller default.
    pub fn deletion_cost(&self) -> i32 {
        self.metadata
            .annotations
            .get(DELETION_COST_ANNOTATION)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

impl fmt::Display for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metadata.namespace, self.metadata.name)
    }
}
