//! Age-based rule.

use chrono::{DateTime, TimeDelta, Utc};
use reaper_pod::Pod;

use crate::duration::{format_duration, parse_duration};
use crate::error::{RuleError, RuleResult};
use crate::rule::ReapRule;
use crate::source::ConfigSource;
use crate::ENV_MAX_DURATION;

/// Reaps pods that have been running longer than a maximum duration.
///
/// Pods without a start time are never reaped. A zero or negative maximum
/// reaps every started pod.
#[derive(Debug, Clone)]
pub struct MaxDuration {
    max: TimeDelta,
    raw: String,
}

impl MaxDuration {
    pub fn new(max: TimeDelta) -> Self {
        Self {
            max,
            raw: format_duration(max),
        }
    }

    pub fn max(&self) -> TimeDelta {
        self.max
    }
}

impl ReapRule for MaxDuration {
    const KEY: &'static str = ENV_MAX_DURATION;

    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>> {
        let Some(raw) = source.get(Self::KEY) else {
            return Ok(None);
        };
        let max = parse_duration(&raw).map_err(|e| RuleError::invalid(Self::KEY, &raw, e))?;
        Ok(Some(Self { max, raw }))
    }

    fn description(&self) -> String {
        format!("maximum run duration {}", self.raw)
    }

    fn should_reap(&self, pod: &Pod, now: DateTime<Utc>) -> Option<String> {
        let start_time = pod.status.start_time?;
        let running = now - start_time;
        if running > self.max {
            Some(format!(
                "has been running for {}",
                format_duration(TimeDelta::seconds(running.num_seconds()))
            ))
        } else {
            None
        }
    }
}
