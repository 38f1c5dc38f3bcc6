//! Schedule expressions and the ticker that drives reap cycles.
//!
//! Accepted forms:
//!
//! - `@every <duration>` with a positive Go-style duration, e.g. `@every 1m30s`
//! - descriptors `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//!   `@midnight`, `@hourly`
//! - standard 5-field cron (`min hour dom month dow`), or 6/7-field cron with
//!   leading seconds and optional trailing year
//!
//! Cron expressions are evaluated in UTC. In the 5-field form, numeric days
//! of week count from `0` = Sunday as in crontab; the 6/7-field form uses the
//! `cron` crate numbering, `1` = Sunday.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use reaper_rules::duration::parse_duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::ScheduleError;

const EVERY_PREFIX: &str = "@every ";

/// A parsed schedule expression.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    kind: ScheduleKind,
}

#[derive(Debug, Clone)]
enum ScheduleKind {
    Every(Duration),
    Cron(Box<cron::Schedule>),
}

fn descriptor(expression: &str) -> Option<&'static str> {
    let cron = match expression {
        "@yearly" | "@annually" => "0 0 0 1 1 *",
        "@monthly" => "0 0 0 1 * *",
        "@weekly" => "0 0 0 * * Sun",
        "@daily" | "@midnight" => "0 0 0 * * *",
        "@hourly" => "0 0 * * * *",
        _ => return None,
    };
    Some(cron)
}

/// Shift crontab day-of-week numbers (`0`-`6`) to the `cron` crate's `1`-`7`.
/// Names, wildcards and step values are left alone.
fn crontab_day_of_week(field: &str) -> String {
    let shift = |n: &str| match n.parse::<u8>() {
        Ok(day @ 0..=6) => (day + 1).to_string(),
        _ => n.to_string(),
    };

    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = range.split('-').map(shift).collect::<Vec<_>>().join("-");
            match step {
                Some(step) => format!("{range}/{step}"),
                None => range,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let invalid = |reason: String| ScheduleError {
            expression: expression.to_string(),
            reason,
        };

        if let Some(every) = expression.strip_prefix(EVERY_PREFIX) {
            let delta = parse_duration(every).map_err(|e| invalid(e.to_string()))?;
            let period = delta
                .to_std()
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| invalid("interval must be positive".to_string()))?;
            return Ok(Self {
                expression: expression.to_string(),
                kind: ScheduleKind::Every(period),
            });
        }

        let normalized = if expression.starts_with('@') {
            descriptor(expression)
                .ok_or_else(|| invalid("unknown descriptor".to_string()))?
                .to_string()
        } else {
            let fields: Vec<&str> = expression.split_whitespace().collect();
            match fields.len() {
                5 => format!(
                    "0 {} {}",
                    fields[..4].join(" "),
                    crontab_day_of_week(fields[4])
                ),
                6 | 7 => expression.to_string(),
                n => return Err(invalid(format!("expected 5 to 7 fields, found {n}"))),
            }
        };

        let cron = cron::Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            expression: expression.to_string(),
            kind: ScheduleKind::Cron(Box::new(cron)),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Fixed period for `@every` schedules.
    pub fn period(&self) -> Option<Duration> {
        match &self.kind {
            ScheduleKind::Every(period) => Some(*period),
            ScheduleKind::Cron(_) => None,
        }
    }

    /// Start ticking. The first tick is one period (or the next cron
    /// occurrence) from now, never immediately.
    pub fn ticker(&self) -> Ticker {
        match &self.kind {
            ScheduleKind::Every(period) => {
                let mut interval = tokio::time::interval_at(Instant::now() + *period, *period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Ticker::Interval(interval)
            }
            ScheduleKind::Cron(cron) => Ticker::Cron(cron.clone()),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Waits for successive schedule occurrences.
#[derive(Debug)]
pub enum Ticker {
    Interval(Interval),
    Cron(Box<cron::Schedule>),
}

impl Ticker {
    /// Wait for the next occurrence.
    ///
    /// Ticks missed while a cycle was running are not replayed. A cron
    /// schedule with no future occurrence never ticks again.
    pub async fn tick(&mut self) {
        match self {
            Self::Interval(interval) => {
                interval.tick().await;
            }
            Self::Cron(cron) => {
                let now = Utc::now();
                let Some(next) = cron.after(&now).next() else {
                    std::future::pending::<()>().await;
                    return;
                };
                let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
