//! Recurring trigger expressions.
//!
//! Standard five-field cron (`minute hour day-of-month month day-of-week`), the usual
//! `@daily`-style descriptors and `@every <interval>`.
mod scheduler;

pub use scheduler::Scheduler;

use std::{fmt, str::FromStr, time::Duration};

use time::{Date, Month, OffsetDateTime, Time};

use crate::error::ScheduleError;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DOW_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// How far ahead [`Schedule::next_after`] searches before giving up.
const SEARCH_YEARS: i32 = 5;

/// When runs fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(CronSpec),
    /// Fixed interval from the previous evaluation.
    Every(Duration),
}

/// Parsed cron fields as bitmasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    expr: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    /// Day-of-month written as `*` or `?`.
    days_any: bool,
    /// Day-of-week written as `*` or `?`.
    weekdays_any: bool,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first entry in `names`.
    names_base: u32,
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], names_base: 0 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], names_base: 0 };
const DAY: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], names_base: 0 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: MONTH_NAMES, names_base: 1 };
const WEEKDAY: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7, names: DOW_NAMES, names_base: 0 };

impl Schedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if let Some(descriptor) = expr.strip_prefix('@') {
            return parse_descriptor(descriptor);
        }

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        let mut weekdays = parse_field(fields[4], &WEEKDAY)?;
        if weekdays & (1u64 << 7) != 0 {
            weekdays = (weekdays & !(1u64 << 7)) | 1;
        }

        Ok(Schedule::Cron(CronSpec {
            expr: fields.join(" "),
            minutes: parse_field(fields[0], &MINUTE)?,
            hours: parse_field(fields[1], &HOUR)?,
            days: parse_field(fields[2], &DAY)?,
            months: parse_field(fields[3], &MONTH)?,
            weekdays,
            days_any: is_any(fields[2]),
            weekdays_any: is_any(fields[4]),
        }))
    }

    /// First fire time strictly after `after`, in the offset of `after`.
    ///
    /// `None` when nothing matches within the next few years (e.g. `0 0 30 2 *`).
    pub fn next_after(&self, after: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Schedule::Every(interval) => {
                let next = after + *interval;
                Some(next.replace_nanosecond(0).unwrap_or(next))
            }
            Schedule::Cron(spec) => spec.next_after(after),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Cron(spec) => f.write_str(&spec.expr),
            Schedule::Every(d) => write!(f, "@every {}s", d.as_secs()),
        }
    }
}

impl CronSpec {
    fn day_matches(&self, t: OffsetDateTime) -> bool {
        let dom = bit(self.days, t.day() as u32);
        let dow = bit(self.weekdays, t.weekday().number_days_from_sunday() as u32);
        if self.days_any || self.weekdays_any {
            dom && dow
        } else {
            dom || dow
        }
    }

    fn next_after(&self, after: OffsetDateTime) -> Option<OffsetDateTime> {
        let offset = after.offset();
        let mut t = after.replace_time(Time::from_hms(after.hour(), after.minute(), 0).ok()?)
            + time::Duration::MINUTE;
        let limit = t.year() + SEARCH_YEARS;

        'wrap: loop {
            if t.year() > limit {
                return None;
            }

            while !bit(self.months, u8::from(t.month()) as u32) {
                let (year, month) = match t.month() {
                    Month::December => (t.year() + 1, Month::January),
                    m => (t.year(), m.next()),
                };
                t = Date::from_calendar_date(year, month, 1)
                    .ok()?
                    .with_time(Time::MIDNIGHT)
                    .assume_offset(offset);
                if month == Month::January {
                    continue 'wrap;
                }
            }

            while !self.day_matches(t) {
                t = t.replace_time(Time::MIDNIGHT) + time::Duration::DAY;
                if t.day() == 1 {
                    continue 'wrap;
                }
            }

            while !bit(self.hours, t.hour() as u32) {
                t = t.replace_time(Time::from_hms(t.hour(), 0, 0).ok()?) + time::Duration::HOUR;
                if t.hour() == 0 {
                    continue 'wrap;
                }
            }

            while !bit(self.minutes, t.minute() as u32) {
                t += time::Duration::MINUTE;
                if t.minute() == 0 {
                    continue 'wrap;
                }
            }

            return Some(t);
        }
    }
}

fn bit(mask: u64, n: u32) -> bool {
    mask & (1u64 << n) != 0
}

fn is_any(field: &str) -> bool {
    field.starts_with('*') || field.starts_with('?')
}

fn parse_descriptor(descriptor: &str) -> Result<Schedule, ScheduleError> {
    let expr = match descriptor.to_ascii_lowercase().as_str() {
        "yearly" | "annually" => "0 0 1 1 *",
        "monthly" => "0 0 1 * *",
        "weekly" => "0 0 * * 0",
        "daily" | "midnight" => "0 0 * * *",
        "hourly" => "0 * * * *",
        other => {
            return match other.strip_prefix("every") {
                Some(rest) if rest.starts_with(char::is_whitespace) => {
                    parse_interval(rest.trim()).map(Schedule::Every)
                }
                _ => Err(ScheduleError::UnknownDescriptor(format!("@{descriptor}"))),
            };
        }
    };
    Schedule::parse(expr)
}

/// Parse `1h30m`, `15m`, `90s` and the like.
fn parse_interval(text: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidInterval(text.to_string());
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        digits.clear();
    }

    if !digits.is_empty() || total == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

fn parse_field(text: &str, spec: &FieldSpec) -> Result<u64, ScheduleError> {
    let invalid = || ScheduleError::InvalidField {
        field: spec.name,
        value: text.to_string(),
    };

    let mut mask = 0u64;
    for part in text.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" || range == "?" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, spec).ok_or_else(invalid)?, parse_value(b, spec).ok_or_else(invalid)?)
        } else {
            let v = parse_value(range, spec).ok_or_else(invalid)?;
            match step {
                Some(_) => (v, spec.max),
                None => (v, v),
            }
        };

        if lo < spec.min || hi > spec.max || lo > hi {
            return Err(invalid());
        }

        let step = step.unwrap_or(1) as usize;
        for n in (lo..=hi).step_by(step) {
            mask |= 1u64 << n;
        }
    }
    Ok(mask)
}

fn parse_value(text: &str, spec: &FieldSpec) -> Option<u32> {
    if let Ok(n) = text.parse::<u32>() {
        return Some(n);
    }
    let lower = text.to_ascii_lowercase();
    spec.names
        .iter()
        .position(|name| *name == lower)
        .map(|i| i as u32 + spec.names_base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn next(expr: &str, after: OffsetDateTime) -> OffsetDateTime {
        Schedule::parse(expr).unwrap().next_after(after).unwrap()
    }

    #[test]
    fn daily_at_midnight() {
        assert_eq!(
            next("0 0 * * *", datetime!(2024-03-01 10:15:42 UTC)),
            datetime!(2024-03-02 00:00:00 UTC)
        );
        assert_eq!(
            next("@daily", datetime!(2024-12-31 23:59:00 UTC)),
            datetime!(2025-01-01 00:00:00 UTC)
        );
    }

    #[test]
    fn strictly_after() {
        assert_eq!(
            next("30 2 * * *", datetime!(2024-03-01 02:30:00 UTC)),
            datetime!(2024-03-02 02:30:00 UTC)
        );
    }

    #[test]
    fn steps_ranges_and_lists() {
        assert_eq!(
            next("*/15 9-17 * * *", datetime!(2024-03-01 17:46:00 UTC)),
            datetime!(2024-03-02 09:00:00 UTC)
        );
        assert_eq!(
            next("5,35 * * * *", datetime!(2024-03-01 10:06:00 UTC)),
            datetime!(2024-03-01 10:35:00 UTC)
        );
        assert_eq!(
            next("10/20 * * * *", datetime!(2024-03-01 10:31:00 UTC)),
            datetime!(2024-03-01 10:50:00 UTC)
        );
    }

    #[test]
    fn names_and_sunday_as_seven() {
        // 2024-03-01 is a Friday.
        assert_eq!(
            next("0 3 * * sun", datetime!(2024-03-01 00:00:00 UTC)),
            datetime!(2024-03-03 03:00:00 UTC)
        );
        assert_eq!(
            next("0 3 * * 7", datetime!(2024-03-01 00:00:00 UTC)),
            datetime!(2024-03-03 03:00:00 UTC)
        );
        assert_eq!(
            next("0 0 1 jul *", datetime!(2024-03-01 00:00:00 UTC)),
            datetime!(2024-07-01 00:00:00 UTC)
        );
    }

    #[test]
    fn restricted_day_fields_combine_with_or() {
        // 13th of the month or any Monday.
        assert_eq!(
            next("0 0 13 * mon", datetime!(2024-03-01 00:00:00 UTC)),
            datetime!(2024-03-04 00:00:00 UTC)
        );
        // Only Mondays when day-of-month is a wildcard.
        assert_eq!(
            next("0 0 * * mon", datetime!(2024-03-01 00:00:00 UTC)),
            datetime!(2024-03-04 00:00:00 UTC)
        );
    }

    #[test]
    fn respects_offset() {
        let after = datetime!(2024-03-01 12:00:00 UTC).to_offset(offset!(+7));
        let fire = next("0 0 * * *", after);
        assert_eq!(fire, datetime!(2024-03-02 00:00:00 +7));
        assert_eq!(fire.offset(), offset!(+7));
    }

    #[test]
    fn every_interval() {
        let schedule = Schedule::parse("@every 1h30m").unwrap();
        assert_eq!(schedule, Schedule::Every(Duration::from_secs(5400)));
        assert_eq!(
            schedule.next_after(datetime!(2024-03-01 00:00:00.250 UTC)),
            Some(datetime!(2024-03-01 01:30:00 UTC))
        );
    }

    #[test]
    fn impossible_date_has_no_next() {
        let schedule = Schedule::parse("0 0 30 2 *").unwrap();
        assert!(schedule.next_after(datetime!(2024-03-01 00:00:00 UTC)).is_none());
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(Schedule::parse("  "), Err(ScheduleError::Empty));
        assert_eq!(Schedule::parse("0 0 * *"), Err(ScheduleError::FieldCount(4)));
        assert!(matches!(
            Schedule::parse("60 0 * * *"),
            Err(ScheduleError::InvalidField { field: "minute", .. })
        ));
        assert!(matches!(
            Schedule::parse("0 0 * * 1/0"),
            Err(ScheduleError::InvalidField { field: "day-of-week", .. })
        ));
        assert!(matches!(
            Schedule::parse("@fortnightly"),
            Err(ScheduleError::UnknownDescriptor(_))
        ));
        assert!(matches!(
            Schedule::parse("@every 10x"),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            Schedule::parse("@every 0s"),
            Err(ScheduleError::InvalidInterval(_))
        ));
    }
}
