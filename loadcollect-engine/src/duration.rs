//! Parsing of the run-duration strings accepted by the load generator's `-t` flag.
//!
//! A duration is a sequence of decimal numbers, each with an optional fraction and
//! a unit suffix: `"5s"`, `"1.5m"`, `"1m30s"`, `"250ms"`, `"2h45m"`. Valid units are
//! `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `"0"` is also accepted.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DurationParseError {
    #[error("empty duration string")]
    Empty,

    #[error("invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("invalid numeric value: {0}")]
    InvalidNumber(String),

    #[error("unknown time unit: {0}")]
    UnknownUnit(String),
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !is_number_char(c)).unwrap_or(rest.len());
        if num_end == 0 {
            return Err(DurationParseError::InvalidFormat(format!(
                "expected a number at {rest:?}"
            )));
        }
        let (num, tail) = rest.split_at(num_end);
        let value: f64 = num
            .parse()
            .map_err(|_| DurationParseError::InvalidNumber(num.to_string()))?;

        let unit_end = tail.find(is_number_char).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(DurationParseError::InvalidFormat("number without unit".into())),
            other => return Err(DurationParseError::UnknownUnit(other.to_string())),
        };

        total_nanos += value * nanos_per_unit;
        rest = tail;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(DurationParseError::InvalidFormat(format!("{s} is out of range")));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
