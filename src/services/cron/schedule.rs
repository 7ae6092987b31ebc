//! Schedule expressions accepted by the cron scheduler.
//!
//! | form                         | example               |
//! |------------------------------|-----------------------|
//! | 5 fields (minute first)      | `*/5 * * * *`         |
//! | 6/7 fields (seconds first)   | `30 0 9 * * Mon-Fri`  |
//! | descriptor                   | `@hourly`, `@daily`   |
//! | fixed interval               | `@every 1m30s`        |
//!
//! Day-of-week numbers follow the usual cron convention: `0` (or `7`) is Sunday and
//! `1-5` is Monday to Friday. They are rewritten into the `cron` crate's numbering
//! (Sunday = 1) before parsing. Day names (`SUN`..`SAT`) are accepted as well.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::CronError;

const EVERY: &str = "@every";

/// Position of the day-of-week field once seconds are present.
const DOW_FIELD: usize = 5;

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Parsed schedule.
#[derive(Clone, Debug)]
pub enum Schedule {
    /// Calendar expression.
    Calendar(Box<cron::Schedule>),
    /// Fixed interval, first occurrence one interval after the reference time.
    Every(Duration),
}

impl Schedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let trimmed = expr.trim();
        let invalid = |reason: String| CronError::InvalidExpression {
            expr: expr.to_string(),
            reason,
        };

        if let Some(rest) = trimmed.strip_prefix(EVERY) {
            if !rest.starts_with(char::is_whitespace) {
                return Err(invalid("expected `@every <duration>`".into()));
            }
            let every = humantime::parse_duration(rest.trim()).map_err(|e| invalid(e.to_string()))?;
            if every.is_zero() {
                return Err(invalid("interval must be positive".into()));
            }
            return Ok(Schedule::Every(every));
        }

        let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
        if fields.len() == 5 {
            fields.insert(0, "0".to_string());
        }
        if let Some(dow) = fields.get_mut(DOW_FIELD) {
            *dow = day_of_week(dow).map_err(invalid)?;
        }
        cron::Schedule::from_str(&fields.join(" "))
            .map(|s| Schedule::Calendar(Box::new(s)))
            .map_err(|e| invalid(e.to_string()))
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Calendar(s) => s.after(after).next(),
            Schedule::Every(d) => chrono::Duration::from_std(*d)
                .ok()
                .and_then(|d| after.checked_add_signed(d)),
        }
    }
}

/// Rewrites a day-of-week field (Sunday = 0 or 7) as an explicit list in the
/// `cron` crate's numbering (Sunday = 1).
fn day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: usize = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("invalid day-of-week step in {part:?}"))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let (first, last) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((a, b)) => (day_number(a)?, day_number(b)?),
            None if step.is_some() => (day_number(range)?, 6),
            None => {
                let d = day_number(range)?;
                (d, d)
            }
        };
        if first > last {
            return Err(format!("day-of-week range {range:?} runs backwards"));
        }
        for d in (first..=last).step_by(step.unwrap_or(1)) {
            days[d % 7] = true;
        }
    }

    Ok(days
        .iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .map(|(d, _)| (d + 1).to_string())
        .collect::<Vec<_>>()
        .join(","))
}

/// Day number with Sunday = 0; `7` is accepted as Sunday.
fn day_number(token: &str) -> Result<usize, String> {
    if let Ok(n) = token.parse::<usize>() {
        return if n <= 7 {
            Ok(n)
        } else {
            Err(format!("day-of-week {n} out of range 0-7"))
        };
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .ok_or_else(|| format!("unknown day-of-week {token:?}"))
}

impl FromStr for Schedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Calendar(s) => write!(f, "{s}"),
            Schedule::Every(d) => write!(f, "{EVERY} {}", humantime::format_duration(*d)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn five_fields_fire_on_the_minute() {
        let s = Schedule::parse("*/5 * * * *").unwrap();
        let next = s.next_after(&at(10, 1, 30)).unwrap();
        assert_eq!((next.minute(), next.second()), (5, 0));
    }

    #[test]
    fn six_fields_keep_seconds() {
        let s = Schedule::parse("15 * * * * *").unwrap();
        let next = s.next_after(&at(10, 0, 0)).unwrap();
        assert_eq!(next.second(), 15);
    }

    /// Saturday 2024-01-06 12:00 UTC.
    fn saturday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn sunday_is_zero() {
        let s = Schedule::parse("0 0 * * 0").unwrap();
        let next = s.next_after(&saturday_noon()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap());
        assert_eq!(next.weekday(), Weekday::Sun);

        let seven = Schedule::parse("0 0 * * 7").unwrap();
        assert_eq!(seven.next_after(&saturday_noon()), Some(next));
    }

    #[test]
    fn weekday_range_skips_the_weekend() {
        let s = Schedule::parse("0 9 * * 1-5").unwrap();
        let next = s.next_after(&saturday_noon()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap());
        assert_eq!(next.weekday(), Weekday::Mon);

        let every_minute = Schedule::parse("* * * * 1-5").unwrap();
        let next = every_minute.next_after(&saturday_noon()).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!((next.hour(), next.minute()), (0, 0));
    }

    #[test]
    fn six_fields_use_the_same_day_numbers() {
        let s = Schedule::parse("30 0 9 * * 1-5").unwrap();
        let next = s.next_after(&saturday_noon()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 30).unwrap());

        let named = Schedule::parse("30 0 9 * * Mon-Fri").unwrap();
        assert_eq!(named.next_after(&saturday_noon()), Some(next));
    }

    #[test]
    fn day_of_week_lists_and_steps() {
        assert_eq!(day_of_week("0,6").unwrap(), "1,7");
        assert_eq!(day_of_week("*/2").unwrap(), "1,3,5,7");
        assert_eq!(day_of_week("1/3").unwrap(), "2,5");
        assert_eq!(day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(day_of_week("*").unwrap(), "*");
        for bad in ["8", "5-1", "*/0", "funday"] {
            assert!(day_of_week(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn descriptors() {
        let s = Schedule::parse("@hourly").unwrap();
        let next = s.next_after(&at(10, 20, 0)).unwrap();
        assert_eq!((next.hour(), next.minute()), (11, 0));
    }

    #[test]
    fn every_interval() {
        let s = Schedule::parse("@every 1m30s").unwrap();
        assert!(matches!(s, Schedule::Every(d) if d == Duration::from_secs(90)));
        assert_eq!(s.next_after(&at(10, 0, 0)), Some(at(10, 1, 30)));
        assert_eq!(s.to_string(), "@every 1m 30s");
    }

    #[test]
    fn rejects_garbage() {
        for expr in ["", "not a schedule", "@every", "@everyday", "@every 0s", "@every soon"] {
            let err = Schedule::parse(expr).unwrap_err();
            assert_eq!(err.as_label(), "cron_invalid_expression", "{expr:?}");
        }
    }
}
