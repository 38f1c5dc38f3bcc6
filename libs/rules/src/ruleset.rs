//! Conjunctive evaluation of loaded rules.

use std::fmt;

use chrono::{DateTime, Utc};
use reaper_pod::Pod;

use crate::error::{RuleError, RuleResult};
use crate::rule::Rule;
use crate::source::ConfigSource;

/// Why a single rule voted to reap a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapReason {
    /// Description of the rule that matched.
    pub rule: String,

    /// The rule's reason for this pod.
    pub reason: String,
}

impl fmt::Display for ReapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.rule)
    }
}

/// Outcome of evaluating a [`RuleSet`] against one pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// At least one rule declined. No partial explanation is kept.
    Spare,

    /// Every rule matched; one reason per rule in registration order.
    Reap(Vec<ReapReason>),
}

impl Verdict {
    pub fn is_reap(&self) -> bool {
        matches!(self, Self::Reap(_))
    }

    /// Reasons for a reap verdict, empty when spared.
    pub fn reasons(&self) -> &[ReapReason] {
        match self {
            Self::Reap(reasons) => reasons,
            Self::Spare => &[],
        }
    }
}

/// The ordered, non-empty set of loaded rules.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Load every configured rule.
    ///
    /// Fails on the first unparsable value, and when no rule is configured.
    pub fn load(source: &dyn ConfigSource) -> RuleResult<Self> {
        Self::from_rules(Rule::load_all(source)?)
    }

    /// Build a set from already loaded rules, keeping their order.
    pub fn from_rules(rules: Vec<Rule>) -> RuleResult<Self> {
        if rules.is_empty() {
            return Err(RuleError::NoRulesLoaded);
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Descriptions of the loaded rules, in registration order.
    pub fn descriptions(&self) -> Vec<String> {
        self.rules.iter().map(Rule::description).collect()
    }

    /// Evaluate the pod against the current wall clock.
    pub fn should_reap(&self, pod: &Pod) -> Verdict {
        self.should_reap_at(pod, Utc::now())
    }

    /// Evaluate the pod as of `now`.
    ///
    /// Rules run in registration order and evaluation stops at the first rule
    /// that declines; later rules are not consulted.
    pub fn should_reap_at(&self, pod: &Pod, now: DateTime<Utc>) -> Verdict {
        let mut reasons = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            match rule.should_reap(pod, now) {
                Some(reason) => reasons.push(ReapReason {
                    rule: rule.description(),
                    reason,
                }),
                None => return Verdict::Spare,
            }
        }
        Verdict::Reap(reasons)
    }
}
