//! Container-state rule.

use chrono::{DateTime, Utc};
use reaper_pod::Pod;

use crate::error::RuleResult;
use crate::rule::ReapRule;
use crate::source::ConfigSource;
use crate::{split_values, ENV_CONTAINER_STATUSES};

/// Reaps pods with a waiting or terminated container whose reason is one of
/// the configured statuses.
///
/// Regular containers are scanned before init containers; the first match
/// wins. Running containers carry no reason and never match.
#[derive(Debug, Clone)]
pub struct ContainerStatus {
    statuses: Vec<String>,
    raw: String,
}

impl ContainerStatus {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statuses: Vec<String> = statuses.into_iter().map(Into::into).collect();
        let raw = statuses.join(",");
        Self { statuses, raw }
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    fn matches(&self, reason: Option<&str>) -> Option<String> {
        let reason = reason?;
        self.statuses
            .iter()
            .any(|s| s == reason)
            .then(|| reason.to_string())
    }
}

impl ReapRule for ContainerStatus {
    const KEY: &'static str = ENV_CONTAINER_STATUSES;

    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>> {
        Ok(source.get(Self::KEY).map(|raw| Self {
            statuses: split_values(&raw),
            raw,
        }))
    }

    fn description(&self) -> String {
        format!("container status in [{}]", self.raw)
    }

    fn should_reap(&self, pod: &Pod, _now: DateTime<Utc>) -> Option<String> {
        if let Some(reason) = pod
            .status
            .container_statuses
            .iter()
            .find_map(|c| self.matches(c.state.reason()))
        {
            return Some(format!("has container status {reason}"));
        }

        pod.status
            .init_container_statuses
            .iter()
            .find_map(|c| self.matches(c.state.reason()))
            .map(|reason| format!("has init container status {reason}"))
    }
}
