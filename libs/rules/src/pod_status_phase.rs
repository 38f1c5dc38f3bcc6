//! Pod-phase rule.

use chrono::{DateTime, Utc};
use reaper_pod::Pod;

use crate::error::RuleResult;
use crate::rule::ReapRule;
use crate::source::ConfigSource;
use crate::{split_values, ENV_POD_STATUS_PHASES};

/// Reaps pods whose phase is one of the configured values.
///
/// Matching is exact and case-sensitive: `failed` does not match `Failed`.
#[derive(Debug, Clone)]
pub struct PodStatusPhase {
    phases: Vec<String>,
    raw: String,
}

impl PodStatusPhase {
    pub fn phases(&self) -> &[String] {
        &self.phases
    }
}

impl ReapRule for PodStatusPhase {
    const KEY: &'static str = ENV_POD_STATUS_PHASES;

    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>> {
        Ok(source.get(Self::KEY).map(|raw| Self {
            phases: split_values(&raw),
            raw,
        }))
    }

    fn description(&self) -> String {
        format!("pod status phase in [{}]", self.raw)
    }

    fn should_reap(&self, pod: &Pod, _now: DateTime<Utc>) -> Option<String> {
        let phase = pod.status.phase.as_ref().map_or("", |p| p.as_str());
        self.phases
            .iter()
            .any(|p| p == phase)
            .then(|| format!("has pod status phase {phase}"))
    }
}
