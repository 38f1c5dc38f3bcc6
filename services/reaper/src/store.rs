//! Pod store abstraction.
//!
//! The reaper only needs three operations from the cluster: list pods in a
//! scope, delete one, or evict one. [`KubeClient`](crate::kube::KubeClient)
//! talks to the real API; [`InMemoryPodStore`] backs tests and local runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reaper_pod::{LabelSelector, Pod};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// How a pod is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapAction {
    Delete,
    Evict,
}

impl ReapAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Evict => "evict",
        }
    }
}

impl fmt::Display for ReapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster operations the reaper depends on.
///
/// `grace_period` is an override in whole seconds; `None` keeps the pod's own
/// termination grace period.
#[async_trait]
pub trait PodStore: Send + Sync {
    /// List pods in `namespace` (empty means every namespace) whose labels
    /// match `selector`, in the store's natural order.
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<Pod>>;

    /// Delete a pod.
    async fn delete(&self, namespace: &str, name: &str, grace_period: Option<i64>)
        -> StoreResult<()>;

    /// Evict a pod through the disruption-budget aware API.
    async fn evict(&self, namespace: &str, name: &str, grace_period: Option<i64>)
        -> StoreResult<()>;
}

/// A termination request received by [`InMemoryPodStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationCall {
    pub action: ReapAction,
    pub namespace: String,
    pub name: String,
    pub grace_period: Option<i64>,
}

/// Pod store held in memory.
///
/// Pods keep insertion order. Failures can be injected per operation, and
/// every delete or evict request is recorded, successful or not.
#[derive(Debug, Default)]
pub struct InMemoryPodStore {
    pods: Mutex<Vec<Pod>>,
    calls: Mutex<Vec<TerminationCall>>,
    list_failure: Mutex<Option<String>>,
    failing: Mutex<HashSet<String>>,
    rejecting_evictions: Mutex<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryPodStore {
    pub fn new(pods: impl IntoIterator<Item = Pod>) -> Self {
        Self {
            pods: Mutex::new(pods.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Pods currently held, in insertion order.
    pub fn pods(&self) -> Vec<Pod> {
        lock(&self.pods).clone()
    }

    /// Names of the pods currently held.
    pub fn pod_names(&self) -> Vec<String> {
        lock(&self.pods).iter().map(|p| p.name().to_string()).collect()
    }

    /// Every delete and evict request received so far.
    pub fn calls(&self) -> Vec<TerminationCall> {
        lock(&self.calls).clone()
    }

    /// Make every subsequent `list` fail with `message`.
    pub fn fail_list(&self, message: impl Into<String>) {
        *lock(&self.list_failure) = Some(message.into());
    }

    /// Make delete and evict of one pod fail.
    pub fn fail_termination_of(&self, namespace: &str, name: &str) {
        lock(&self.failing).insert(format!("{namespace}/{name}"));
    }

    /// Reject every eviction as a disruption budget would.
    pub fn reject_evictions(&self) {
        *lock(&self.rejecting_evictions) = true;
    }

    fn terminate(&self, call: TerminationCall) -> StoreResult<()> {
        let key = format!("{}/{}", call.namespace, call.name);
        let action = call.action;
        let (namespace, name) = (call.namespace.clone(), call.name.clone());
        lock(&self.calls).push(call);

        if lock(&self.failing).contains(&key) {
            return Err(StoreError::Unavailable(format!("{action} of {key} failed")));
        }
        if action == ReapAction::Evict && *lock(&self.rejecting_evictions) {
            return Err(StoreError::EvictionRejected {
                namespace,
                name,
                message: "Cannot evict pod as it would violate the pod's disruption budget."
                    .to_string(),
            });
        }

        let mut pods = lock(&self.pods);
        match pods
            .iter()
            .position(|p| p.namespace() == namespace && p.name() == name)
        {
            Some(index) => {
                pods.remove(index);
                debug!(pod = %key, action = %action, "Removed pod from memory store");
                Ok(())
            }
            None => Err(StoreError::NotFound { namespace, name }),
        }
    }
}

#[async_trait]
impl PodStore for InMemoryPodStore {
    async fn list(&self, namespace: &str, selector: &LabelSelector) -> StoreResult<Vec<Pod>> {
        if let Some(message) = lock(&self.list_failure).clone() {
            return Err(StoreError::Unavailable(message));
        }

        Ok(lock(&self.pods)
            .iter()
            .filter(|p| namespace.is_empty() || p.namespace() == namespace)
            .filter(|p| selector.matches(&p.metadata.labels))
            .cloned()
            .collect())
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Option<i64>,
    ) -> StoreResult<()> {
        self.terminate(TerminationCall {
            action: ReapAction::Delete,
            namespace: namespace.to_string(),
            name: name.to_string(),
            grace_period,
        })
    }

    async fn evict(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Option<i64>,
    ) -> StoreResult<()> {
        self.terminate(TerminationCall {
            action: ReapAction::Evict,
            namespace: namespace.to_string(),
            name: name.to_string(),
            grace_period,
        })
    }
}
