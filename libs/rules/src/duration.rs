//! Go-style duration strings.
//!
//! Accepts an optional sign followed by one or more `<decimal><unit>` groups,
//! e.g. `90s`, `1m59s`, `1.5h`, `-10m`. Units are `ns`, `us` (`µs`), `ms`,
//! `s`, `m` and `h`. A bare `0` is allowed. Input is never trimmed.

use chrono::TimeDelta;
use thiserror::Error;

/// A duration string that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationError {
    pub input: String,
    pub reason: &'static str,
}

const NANOS_PER_MICRO: i128 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_SEC: i128 = 1_000_000_000;
const NANOS_PER_MIN: i128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MIN;

// Fraction digits beyond this cannot change a nanosecond result.
const MAX_FRACTION_DIGITS: usize = 18;

fn unit_nanos(unit: &str) -> Option<i128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(NANOS_PER_MIN),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Parse a Go-style duration.
pub fn parse_duration(input: &str) -> Result<TimeDelta, DurationError> {
    let err = |reason| DurationError {
        input: input.to_string(),
        reason,
    };

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(TimeDelta::zero());
    }
    if rest.is_empty() {
        return Err(err("empty duration"));
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err("expected a number"));
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(err("missing unit"));
        }
        let unit = unit_nanos(&rest[..unit_len]).ok_or_else(|| err("unknown unit"))?;
        rest = &rest[unit_len..];

        let whole: i128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err("number out of range"))?
        };
        total = whole
            .checked_mul(unit)
            .and_then(|n| total.checked_add(n))
            .ok_or_else(|| err("duration out of range"))?;

        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
            let numerator: i128 = digits.parse().map_err(|_| err("number out of range"))?;
            let scale = 10_i128.pow(digits.len() as u32);
            total += numerator * unit / scale;
        }

        if total > i64::MAX as i128 {
            return Err(err("duration out of range"));
        }
    }

    let nanos = if negative { -total } else { total };
    Ok(TimeDelta::nanoseconds(nanos as i64))
}

/// Format a duration the way Go prints one, e.g. `1h2m3s`, `2m0s`, `1.5s`,
/// `250ms`.
pub fn format_duration(duration: TimeDelta) -> String {
    let nanos = duration.num_nanoseconds().map(i128::from).unwrap_or_else(|| {
        i128::from(duration.num_seconds()) * NANOS_PER_SEC
    });
    if nanos == 0 {
        return "0s".to_string();
    }

    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.abs();

    if abs < NANOS_PER_SEC {
        let (unit, scale) = if abs < NANOS_PER_MICRO {
            ("ns", 1)
        } else if abs < NANOS_PER_MILLI {
            ("µs", NANOS_PER_MICRO)
        } else {
            ("ms", NANOS_PER_MILLI)
        };
        return format!("{sign}{}{unit}", with_fraction(abs, scale));
    }

    let hours = abs / NANOS_PER_HOUR;
    let minutes = (abs % NANOS_PER_HOUR) / NANOS_PER_MIN;
    let seconds = with_fraction(abs % NANOS_PER_MIN, NANOS_PER_SEC);

    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

fn with_fraction(value: i128, scale: i128) -> String {
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
