//! Probabilistic rule.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reaper_pod::Pod;

use crate::error::{RuleError, RuleResult};
use crate::rule::ReapRule;
use crate::source::ConfigSource;
use crate::ENV_CHAOS_CHANCE;

/// Reaps any pod with a fixed probability.
///
/// A draw `r` is taken uniformly from `[0, 1)` and the pod is reaped iff
/// `r < chance`. The chance is not range-checked: values above 1 and
/// `+inf` always reap, negative values, `-inf` and NaN never do.
///
/// The generator is shared by every evaluation of this rule and guarded by a
/// mutex, so concurrent evaluation stays sound.
#[derive(Debug)]
pub struct Chaos {
    chance: f64,
    raw: String,
    rng: Mutex<StdRng>,
}

impl Chaos {
    /// Create a rule seeded from the operating system.
    pub fn new(chance: f64) -> Self {
        Self::with_rng(chance, StdRng::from_os_rng())
    }

    /// Create a rule drawing from the given generator.
    pub fn with_rng(chance: f64, rng: StdRng) -> Self {
        Self {
            chance,
            raw: chance.to_string(),
            rng: Mutex::new(rng),
        }
    }

    pub fn chance(&self) -> f64 {
        self.chance
    }

    fn draw(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random::<f64>()
    }
}

impl ReapRule for Chaos {
    const KEY: &'static str = ENV_CHAOS_CHANCE;

    fn load(source: &dyn ConfigSource) -> RuleResult<Option<Self>> {
        let Some(raw) = source.get(Self::KEY) else {
            return Ok(None);
        };
        let chance: f64 = raw
            .parse()
            .map_err(|e| RuleError::invalid(Self::KEY, &raw, e))?;

        let mut rule = Self::new(chance);
        rule.raw = raw;
        Ok(Some(rule))
    }

    fn description(&self) -> String {
        format!("chaos chance {}", self.raw)
    }

    fn should_reap(&self, _pod: &Pod, _now: DateTime<Utc>) -> Option<String> {
        // NaN compares false, so it never reaps.
        if self.draw() < self.chance {
            Some("was flagged for chaos".to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::source;
    use rstest::rstest;

    const TRIALS: usize = 1000;

    fn reap_count(rule: &Chaos) -> usize {
        let pod = Pod::default();
        let now = Utc::now();
        (0..TRIALS)
            .filter(|_| rule.should_reap(&pod, now).is_some())
            .count()
    }

    #[test]
    fn test_load() {
        let rule = Chaos::load(&source(&[(ENV_CHAOS_CHANCE, "0.5")]))
            .unwrap()
            .unwrap();
        assert_eq!(rule.description(), "chaos chance 0.5");
        assert_eq!(rule.chance(), 0.5);
    }

    #[test]
    fn test_no_load() {
        assert!(Chaos::load(&source(&[])).unwrap().is_none());
    }

    #[rstest]
    #[case("not-a-number")]
    #[case(" 0.5 ")]
    #[case("")]
    fn test_invalid_chance(#[case] raw: &str) {
        let err = Chaos::load(&source(&[(ENV_CHAOS_CHANCE, raw)])).unwrap_err();
        assert!(matches!(err, RuleError::InvalidValue { key: ENV_CHAOS_CHANCE, .. }));
    }

    #[rstest]
    #[case("-0.5", -0.5)]
    #[case("2.0", 2.0)]
    fn test_out_of_range_chance_loads(#[case] raw: &str, #[case] expected: f64) {
        let rule = Chaos::load(&source(&[(ENV_CHAOS_CHANCE, raw)]))
            .unwrap()
            .unwrap();
        assert_eq!(rule.chance(), expected);
        assert_eq!(rule.description(), format!("chaos chance {raw}"));
    }

    #[test]
    fn test_special_values_load() {
        let rule = Chaos::load(&source(&[(ENV_CHAOS_CHANCE, "NaN")]))
            .unwrap()
            .unwrap();
        assert!(rule.chance().is_nan());

        let rule = Chaos::load(&source(&[(ENV_CHAOS_CHANCE, "-inf")]))
            .unwrap()
            .unwrap();
        assert_eq!(rule.chance(), f64::NEG_INFINITY);
    }

    #[rstest]
    #[case(1.0)]
    #[case(2.0)]
    #[case(f64::INFINITY)]
    fn test_always_reaps(#[case] chance: f64) {
        let rule = Chaos::with_rng(chance, StdRng::seed_from_u64(7));
        assert_eq!(reap_count(&rule), TRIALS);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.5)]
    #[case(f64::NAN)]
    #[case(f64::NEG_INFINITY)]
    fn test_never_reaps(#[case] chance: f64) {
        let rule = Chaos::with_rng(chance, StdRng::seed_from_u64(7));
        assert_eq!(reap_count(&rule), 0);
    }

    #[test]
    fn test_reason() {
        let rule = Chaos::with_rng(1.0, StdRng::seed_from_u64(1));
        assert_eq!(
            rule.should_reap(&Pod::default(), Utc::now()).as_deref(),
            Some("was flagged for chaos")
        );
    }

    #[test]
    fn test_half_chance_is_roughly_half() {
        let rule = Chaos::with_rng(0.5, StdRng::seed_from_u64(42));
        let count = reap_count(&rule);
        assert!((350..650).contains(&count), "got {count}");
    }

    #[test]
    fn test_seeded_rules_agree() {
        let a = Chaos::with_rng(0.5, StdRng::seed_from_u64(3));
        let b = Chaos::with_rng(0.5, StdRng::seed_from_u64(3));
        let pod = Pod::default();
        let now = Utc::now();
        for _ in 0..100 {
            assert_eq!(a.should_reap(&pod, now), b.should_reap(&pod, now));
        }
    }
}
