//! Pod-reason rule.

use chrono::{DateTime, Utc};
use reaper_pod::Pod;

use crate::error::RuleResult;
use crate::rule::ReapRule;
use crate::source::ConfigSource;
use crate::{split_values, ENV_POD_STATUSES};

/// Reaps pods whose top-level status reason (e.g. `Evicted`) is one of the
/// configured values.
#[derive(Debug, Clone)]
pub struct PodStatus {
    statuses: Vec<String>,
    raw: String,
}

impl PodStatus {
    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }
}

impl ReapRule for PodStatus {
    const KEY: &'static str = ENV_POD_STATUSES;

    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>> {
        Ok(source.get(Self::KEY).map(|raw| Self {
            statuses: split_values(&raw),
            raw,
        }))
    }

    fn description(&self) -> String {
        format!("pod status in [{}]", self.raw)
    }

    fn should_reap(&self, pod: &Pod, _now: DateTime<Utc>) -> Option<String> {
        let reason = &pod.status.reason;
        self.statuses
            .contains(reason)
            .then(|| format!("has pod status {reason}"))
    }
}
