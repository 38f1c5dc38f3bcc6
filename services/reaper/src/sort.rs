//! Candidate ordering.
//!
//! The order decides which pods are reaped first when the per-cycle cap is
//! reached.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use reaper_pod::Pod;

/// How pods are ordered before rules are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortStrategy {
    /// Keep the store's order.
    #[default]
    Unsorted,

    /// Uniform random permutation.
    Random,

    /// Earliest start time first; unstarted pods last.
    OldestFirst,

    /// Latest start time first; unstarted pods last.
    YoungestFirst,

    /// Lowest `controller.kubernetes.io/pod-deletion-cost` first.
    DeletionCost,
}

impl SortStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsorted => "",
            Self::Random => "random",
            Self::OldestFirst => "oldest-first",
            Self::YoungestFirst => "youngest-first",
            Self::DeletionCost => "pod-deletion-cost",
        }
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsorted => f.write_str("unsorted"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for SortStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Unsorted),
            "random" => Ok(Self::Random),
            "oldest-first" => Ok(Self::OldestFirst),
            "youngest-first" => Ok(Self::YoungestFirst),
            "pod-deletion-cost" | "priority-cost" => Ok(Self::DeletionCost),
            other => Err(format!(
                "unknown sorting strategy {other:?}, expected one of random, oldest-first, \
                 youngest-first, pod-deletion-cost"
            )),
        }
    }
}

/// Unset start times compare greater than any set one.
fn by_start_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, newest: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if newest => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Reorder `pods` in place. Every strategy except `Random` is stable.
pub fn sort_pods<R: Rng + ?Sized>(pods: &mut [Pod], strategy: SortStrategy, rng: &mut R) {
    match strategy {
        SortStrategy::Unsorted => {}
        SortStrategy::Random => pods.shuffle(rng),
        SortStrategy::OldestFirst => {
            pods.sort_by(|a, b| by_start_time(a.status.start_time, b.status.start_time, false))
        }
        SortStrategy::YoungestFirst => {
            pods.sort_by(|a, b| by_start_time(a.status.start_time, b.status.start_time, true))
        }
        SortStrategy::DeletionCost => pods.sort_by_key(Pod::deletion_cost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use reaper_pod::DELETION_COST_ANNOTATION;
    use rstest::rstest;

    fn names(pods: &[Pod]) -> Vec<&str> {
        pods.iter().map(Pod::name).collect()
    }

    fn aged_pods() -> Vec<Pod> {
        let now = Utc::now();
        vec![
            Pod::new("middle", "default").with_start_time(now - TimeDelta::minutes(5)),
            Pod::new("unstarted", "default"),
            Pod::new("oldest", "default").with_start_time(now - TimeDelta::hours(1)),
            Pod::new("youngest", "default").with_start_time(now - TimeDelta::seconds(10)),
        ]
    }

    #[rstest]
    #[case("", SortStrategy::Unsorted)]
    #[case("random", SortStrategy::Random)]
    #[case("oldest-first", SortStrategy::OldestFirst)]
    #[case("youngest-first", SortStrategy::YoungestFirst)]
    #[case("pod-deletion-cost", SortStrategy::DeletionCost)]
    #[case("priority-cost", SortStrategy::DeletionCost)]
    fn test_parse(#[case] raw: &str, #[case] expected: SortStrategy) {
        assert_eq!(raw.parse::<SortStrategy>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        assert!("Oldest-First".parse::<SortStrategy>().is_err());
        assert!("largest".parse::<SortStrategy>().is_err());
    }

    #[test]
    fn test_unsorted_keeps_order() {
        let mut pods = aged_pods();
        sort_pods(&mut pods, SortStrategy::Unsorted, &mut StdRng::seed_from_u64(0));
        assert_eq!(names(&pods), ["middle", "unstarted", "oldest", "youngest"]);
    }

    #[test]
    fn test_oldest_first() {
        let mut pods = aged_pods();
        sort_pods(&mut pods, SortStrategy::OldestFirst, &mut StdRng::seed_from_u64(0));
        assert_eq!(names(&pods), ["oldest", "middle", "youngest", "unstarted"]);
    }

    #[test]
    fn test_youngest_first() {
        let mut pods = aged_pods();
        sort_pods(&mut pods, SortStrategy::YoungestFirst, &mut StdRng::seed_from_u64(0));
        assert_eq!(names(&pods), ["youngest", "middle", "oldest", "unstarted"]);
    }

    #[test]
    fn test_deletion_cost_ascending_and_stable() {
        let mut pods = vec![
            Pod::new("expensive", "default").with_annotation(DELETION_COST_ANNOTATION, "100"),
            Pod::new("unannotated", "default"),
            Pod::new("cheap", "default").with_annotation(DELETION_COST_ANNOTATION, "-5"),
            Pod::new("garbage", "default").with_annotation(DELETION_COST_ANNOTATION, "lots"),
        ];
        sort_pods(&mut pods, SortStrategy::DeletionCost, &mut StdRng::seed_from_u64(0));
        assert_eq!(names(&pods), ["cheap", "unannotated", "garbage", "expensive"]);
    }

    #[test]
    fn test_random_is_a_permutation() {
        let mut pods = aged_pods();
        sort_pods(&mut pods, SortStrategy::Random, &mut StdRng::seed_from_u64(42));

        let mut sorted = names(&pods);
        sorted.sort_unstable();
        assert_eq!(sorted, ["middle", "oldest", "unstarted", "youngest"]);
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let mut first = aged_pods();
        let mut second = aged_pods();
        sort_pods(&mut first, SortStrategy::Random, &mut StdRng::seed_from_u64(7));
        sort_pods(&mut second, SortStrategy::Random, &mut StdRng::seed_from_u64(7));
        assert_eq!(names(&first), names(&second));
    }
}
