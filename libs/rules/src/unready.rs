//! Unready-duration rule.

use chrono::{DateTime, TimeDelta, Utc};
use reaper_pod::Pod;

use crate::duration::{format_duration, parse_duration};
use crate::error::{RuleError, RuleResult};
use crate::rule::ReapRule;
use crate::source::ConfigSource;
use crate::ENV_MAX_UNREADY;

/// Reaps pods whose `Ready` condition has not been `True` for longer than a
/// maximum duration.
///
/// Any status other than the literal `True` counts as unready. Pods without a
/// `Ready` condition, or whose condition has no transition time, are left
/// alone because the unready time cannot be determined.
#[derive(Debug, Clone)]
pub struct Unready {
    max: TimeDelta,
    raw: String,
}

impl Unready {
    pub fn new(max: TimeDelta) -> Self {
        Self {
            max,
            raw: format_duration(max),
        }
    }
}

impl ReapRule for Unready {
    const KEY: &'static str = ENV_MAX_UNREADY;

    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>> {
        let Some(raw) = source.get(Self::KEY) else {
            return Ok(None);
        };
        let max = parse_duration(&raw).map_err(|e| RuleError::invalid(Self::KEY, &raw, e))?;
        Ok(Some(Self { max, raw }))
    }

    fn description(&self) -> String {
        format!("maximum unready {}", self.raw)
    }

    fn should_reap(&self, pod: &Pod, now: DateTime<Utc>) -> Option<String> {
        let condition = pod.ready_condition()?;
        if condition.status == "True" {
            return None;
        }
        let since = condition.last_transition_time?;
        let unready = now - since;
        if unready > self.max {
            Some(format!(
                "has been unready for {}",
                format_duration(TimeDelta::seconds(unready.num_seconds()))
            ))
        } else {
            None
        }
    }
}
