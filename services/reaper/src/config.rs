//! Configuration for the reaper.
//!
//! Every value comes from environment variables, read through a
//! [`ConfigSource`] so tests can supply a map instead.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reaper_pod::{LabelSelector, Operator, Requirement};
use reaper_rules::duration::parse_duration;
use reaper_rules::{ConfigSource, EnvSource, RuleSet};

use crate::error::ConfigError;
use crate::kube::KubeConfig;
use crate::schedule::Schedule;
use crate::sort::SortStrategy;

pub const ENV_NAMESPACE: &str = "NAMESPACE";
pub const ENV_SCHEDULE: &str = "SCHEDULE";
pub const ENV_RUN_DURATION: &str = "RUN_DURATION";
pub const ENV_GRACE_PERIOD: &str = "GRACE_PERIOD";
pub const ENV_EVICT: &str = "EVICT";
pub const ENV_DRY_RUN: &str = "DRY_RUN";
pub const ENV_MAX_PODS: &str = "MAX_PODS";
pub const ENV_POD_SORTING_STRATEGY: &str = "POD_SORTING_STRATEGY";
pub const ENV_EXCLUDE_LABEL_KEY: &str = "EXCLUDE_LABEL_KEY";
pub const ENV_EXCLUDE_LABEL_VALUES: &str = "EXCLUDE_LABEL_VALUES";
pub const ENV_REQUIRE_LABEL_KEY: &str = "REQUIRE_LABEL_KEY";
pub const ENV_REQUIRE_LABEL_VALUES: &str = "REQUIRE_LABEL_VALUES";
pub const ENV_REQUIRE_ANNOTATION_KEY: &str = "REQUIRE_ANNOTATION_KEY";
pub const ENV_REQUIRE_ANNOTATION_VALUES: &str = "REQUIRE_ANNOTATION_VALUES";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

pub const DEFAULT_SCHEDULE: &str = "@every 1m";

/// Validated reaper options, immutable once loaded.
#[derive(Debug)]
pub struct Options {
    /// Namespace to scan; empty for every namespace.
    pub namespace: String,

    pub schedule: Schedule,

    /// Total time to keep scheduling cycles; `None` runs until shut down.
    pub run_duration: Option<Duration>,

    /// Grace-period override in whole seconds.
    pub grace_period: Option<i64>,

    /// Evict instead of delete.
    pub evict: bool,

    pub dry_run: bool,

    /// Maximum pods reaped per cycle; 0 is unlimited.
    pub max_pods: usize,

    pub sorting: SortStrategy,

    /// `key notin (values)` passed to the store query.
    pub label_exclusion: Option<Requirement>,

    /// `key in (values)` passed to the store query.
    pub label_requirement: Option<Requirement>,

    /// `key in (values)` checked against annotations after listing.
    pub annotation_requirement: Option<Requirement>,

    pub rules: RuleSet,
}

impl Options {
    /// Load options and rules from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let namespace = source.get(ENV_NAMESPACE).unwrap_or_default();

        let schedule = source
            .get(ENV_SCHEDULE)
            .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string());
        let schedule = Schedule::parse(&schedule)?;

        let run_duration = match source.get(ENV_RUN_DURATION) {
            Some(raw) => {
                let delta = parse_duration(&raw)
                    .map_err(|e| ConfigError::invalid(ENV_RUN_DURATION, &raw, e))?;
                let duration = delta.to_std().map_err(|_| {
                    ConfigError::invalid(ENV_RUN_DURATION, &raw, "must not be negative")
                })?;
                (!duration.is_zero()).then_some(duration)
            }
            None => None,
        };

        let grace_period = source
            .get(ENV_GRACE_PERIOD)
            .map(|raw| {
                parse_duration(&raw)
                    .map(|d| d.num_seconds())
                    .map_err(|e| ConfigError::invalid(ENV_GRACE_PERIOD, &raw, e))
            })
            .transpose()?;

        let max_pods = source
            .get(ENV_MAX_PODS)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    ConfigError::invalid(ENV_MAX_PODS, &raw, "must be a non-negative integer")
                })
            })
            .transpose()?
            .unwrap_or(0);

        let sorting = source
            .get(ENV_POD_SORTING_STRATEGY)
            .map(|raw| {
                raw.parse::<SortStrategy>()
                    .map_err(|e| ConfigError::invalid(ENV_POD_SORTING_STRATEGY, &raw, e))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            namespace,
            schedule,
            run_duration,
            grace_period,
            evict: parse_flag(source, ENV_EVICT)?,
            dry_run: parse_flag(source, ENV_DRY_RUN)?,
            max_pods,
            sorting,
            label_exclusion: requirement(
                source,
                ENV_EXCLUDE_LABEL_KEY,
                ENV_EXCLUDE_LABEL_VALUES,
                Operator::NotIn,
            )?,
            label_requirement: requirement(
                source,
                ENV_REQUIRE_LABEL_KEY,
                ENV_REQUIRE_LABEL_VALUES,
                Operator::In,
            )?,
            annotation_requirement: requirement(
                source,
                ENV_REQUIRE_ANNOTATION_KEY,
                ENV_REQUIRE_ANNOTATION_VALUES,
                Operator::In,
            )?,
            rules: RuleSet::load(source)?,
        })
    }

    /// Label selector sent with every list query.
    pub fn label_selector(&self) -> LabelSelector {
        self.label_exclusion
            .iter()
            .chain(self.label_requirement.iter())
            .cloned()
            .collect()
    }
}

/// Parse a boolean the way Go's `strconv.ParseBool` does. Absent is false.
fn parse_flag(source: &dyn ConfigSource, key: &'static str) -> Result<bool, ConfigError> {
    match source.get(key).as_deref() {
        None => Ok(false),
        Some("1" | "t" | "T" | "TRUE" | "true" | "True") => Ok(true),
        Some("0" | "f" | "F" | "FALSE" | "false" | "False") => Ok(false),
        Some(other) => Err(ConfigError::invalid(key, other, "expected a boolean")),
    }
}

/// Build a requirement from a key variable and a comma-separated values
/// variable. Absent key means no requirement.
fn requirement(
    source: &dyn ConfigSource,
    key_var: &'static str,
    values_var: &'static str,
    operator: Operator,
) -> Result<Option<Requirement>, ConfigError> {
    let Some(key) = source.get(key_var) else {
        return Ok(None);
    };
    let values = source.get(values_var).ok_or(ConfigError::MissingValues {
        key: key_var,
        values_key: values_var,
    })?;
    let values = values.split(',').filter(|v| !v.is_empty());
    Ok(Some(Requirement::new(key, operator, values)?))
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown log format {other:?}, expected json or text")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Logging settings, loaded ahead of everything else so later failures are
/// reported in the configured format.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let level = source
            .get(ENV_LOG_LEVEL)
            .unwrap_or_else(|| "info".to_string());
        let format = source
            .get(ENV_LOG_FORMAT)
            .map(|raw| {
                raw.parse()
                    .map_err(|e| ConfigError::invalid(ENV_LOG_FORMAT, &raw, e))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self { level, format })
    }
}

/// Everything the process needs to start.
#[derive(Debug)]
pub struct Config {
    pub kube: KubeConfig,
    pub options: Options,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            options: Options::from_source(source)?,
            kube: KubeConfig::from_source(source)?,
        })
    }
}
