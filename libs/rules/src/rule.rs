//! The rule contract and the closed set of rule variants.

use chrono::{DateTime, Utc};
use reaper_pod::Pod;

use crate::error::RuleResult;
use crate::source::ConfigSource;
use crate::{Chaos, ContainerStatus, MaxDuration, PodStatus, PodStatusPhase, Unready};

/// Contract shared by every rule variant.
pub trait ReapRule: Sized {
    /// Configuration key the rule reads.
    const KEY: &'static str;

    /// Load the rule from configuration.
    ///
    /// Returns `Ok(None)` when the key is absent (the rule is inert) and an
    /// error when the value is present but cannot be parsed.
    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>>;

    /// Human-readable description of the configured criterion.
    fn description(&self) -> String;

    /// Decide whether `pod` should be reaped, returning the reason if so.
    fn should_reap(&self, pod: &Pod, now: DateTime<Utc>) -> Option<String>;
}

/// A loaded rule.
#[derive(Debug)]
pub enum Rule {
    Chaos(Chaos),
    ContainerStatus(ContainerStatus),
    MaxDuration(MaxDuration),
    Unready(Unready),
    PodStatus(PodStatus),
    PodStatusPhase(PodStatusPhase),
}

impl Rule {
    /// Load every variant in registration order, keeping those that are
    /// configured. The first parse error aborts loading.
    pub fn load_all(source: &dyn ConfigSource) -> RuleResult<Vec<Rule>> {
        let loaded = [
            Chaos::load(source)?.map(Rule::Chaos),
            ContainerStatus::load(source)?.map(Rule::ContainerStatus),
            MaxDuration::load(source)?.map(Rule::MaxDuration),
            Unready::load(source)?.map(Rule::Unready),
            PodStatus::load(source)?.map(Rule::PodStatus),
            PodStatusPhase::load(source)?.map(Rule::PodStatusPhase),
        ];
        Ok(loaded.into_iter().flatten().collect())
    }

    /// Configuration key of the underlying variant.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Chaos(_) => Chaos::KEY,
            Self::ContainerStatus(_) => ContainerStatus::KEY,
            Self::MaxDuration(_) => MaxDuration::KEY,
            Self::Unready(_) => Unready::KEY,
            Self::PodStatus(_) => PodStatus::KEY,
            Self::PodStatusPhase(_) => PodStatusPhase::KEY,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Chaos(r) => r.description(),
            Self::ContainerStatus(r) => r.description(),
            Self::MaxDuration(r) => r.description(),
            Self::Unready(r) => r.description(),
            Self::PodStatus(r) => r.description(),
            Self::PodStatusPhase(r) => r.description(),
        }
    }

    pub fn should_reap(&self, pod: &Pod, now: DateTime<Utc>) -> Option<String> {
        match self {
            Self::Chaos(r) => r.should_reap(pod, now),
            Self::ContainerStatus(r) => r.should_reap(pod, now),
            Self::MaxDuration(r) => r.should_reap(pod, now),
            Self::Unready(r) => r.should_reap(pod, now),
            Self::PodStatus(r) => r.should_reap(pod, now),
            Self::PodStatusPhase(r) => r.should_reap(pod, now),
        }
    }
}
