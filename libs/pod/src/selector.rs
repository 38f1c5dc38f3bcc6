//! Set-based requirements over string maps (labels or annotations).
//!
//! Semantics follow Kubernetes label selectors:
//! - `in`: key present and its value in the set
//! - `notin`: key absent, or its value outside the set
//!
//! Keys must be qualified names and values must be label values, so a
//! malformed requirement is rejected when it is built rather than by the API
//! server on the first list.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::SelectorError;

/// Longest name segment or label value.
const MAX_NAME_LEN: usize = 63;

/// Longest key prefix (a DNS subdomain).
const MAX_PREFIX_LEN: usize = 253;

/// Set-membership operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::NotIn => "notin",
        }
    }
}

/// A single `key <operator> (values)` requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

/// Alphanumeric at both ends, `-`, `_` or `.` in between.
fn is_name_segment(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

/// Lowercase DNS labels joined by dots.
fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: &'static str| SelectorError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN || !is_dns_subdomain(prefix) {
            return Err(invalid("prefix must be a lowercase DNS subdomain"));
        }
    }
    if name.is_empty() || name.len() > MAX_NAME_LEN || !is_name_segment(name) {
        return Err(invalid(
            "name must be 1-63 characters of [A-Za-z0-9-_.], alphanumeric at both ends",
        ));
    }
    Ok(())
}

/// Label values may be empty; otherwise they follow the name segment rules.
fn validate_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.len() > MAX_NAME_LEN || (!value.is_empty() && !is_name_segment(value)) {
        return Err(SelectorError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

impl Requirement {
    /// Build a requirement, validating the key and every value.
    pub fn new<I, S>(key: impl Into<String>, operator: Operator, values: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        if key.is_empty() {
            return Err(SelectorError::EmptyKey);
        }
        validate_key(&key)?;

        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(SelectorError::MissingValues {
                key,
                operator: operator.as_str(),
            });
        }
        for value in &values {
            validate_value(&key, value)?;
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// Check the requirement against a label or annotation map.
    pub fn matches(&self, map: &BTreeMap<String, String>) -> bool {
        let value = map.get(&self.key);
        match self.operator {
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<&str> = self.values().collect();
        write!(f, "{} {} ({})", self.key, self.operator.as_str(), values.join(","))
    }
}

/// A conjunction of requirements.
///
/// Renders in the `labelSelector` query syntax understood by the API server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// True when every requirement matches. An empty selector matches everything.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromIterator<Requirement> for LabelSelector {
    fn from_iter<T: IntoIterator<Item = Requirement>>(iter: T) -> Self {
        Self {
            requirements: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
