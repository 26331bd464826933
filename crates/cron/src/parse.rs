//! Parsing utilities for ISO 8601 durations and absolute timestamps.

use std::fmt;

use chrono::{DateTime, Months, TimeDelta, Utc};

use crate::{Error, Result};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;

/// An ISO 8601 duration such as `P1W` or `P1Y2M3DT4H5M6S`.
///
/// Years and months are calendar units and are applied with calendar
/// arithmetic; every other component has a fixed length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IsoDuration {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl IsoDuration {
    #[must_use]
    pub fn weeks(weeks: u32) -> Self {
        Self {
            weeks,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    fn calendar_months(&self) -> u32 {
        self.years.saturating_mul(12).saturating_add(self.months)
    }

    /// Length of the week/day/time components in seconds.
    pub(crate) fn fixed_secs(&self) -> i64 {
        i64::from(self.weeks) * SECS_PER_WEEK
            + i64::from(self.days) * SECS_PER_DAY
            + i64::from(self.hours) * SECS_PER_HOUR
            + i64::from(self.minutes) * SECS_PER_MINUTE
            + i64::from(self.seconds)
    }

    /// Upper bound on the length of one step, in seconds. Months count as 31 days.
    pub(crate) fn max_step_secs(&self) -> i64 {
        i64::from(self.calendar_months()) * 31 * SECS_PER_DAY + self.fixed_secs()
    }

    /// Apply this duration `times` times to `from`. `None` on overflow.
    #[must_use]
    pub fn add_to(&self, from: DateTime<Utc>, times: u32) -> Option<DateTime<Utc>> {
        let months = self.calendar_months().checked_mul(times)?;
        let shifted = if months == 0 {
            from
        } else {
            from.checked_add_months(Months::new(months))?
        };
        let fixed = self.fixed_secs().checked_mul(i64::from(times))?;
        shifted.checked_add_signed(TimeDelta::try_seconds(fixed)?)
    }

    /// Build a fixed duration from a number of seconds, split into days and seconds.
    pub(crate) fn from_secs(secs: u64) -> Option<Self> {
        let day = SECS_PER_DAY as u64;
        Some(Self {
            days: u32::try_from(secs / day).ok()?,
            seconds: u32::try_from(secs % day).ok()?,
            ..Self::default()
        })
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("P0D");
        }
        f.write_str("P")?;
        for (value, unit) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if value > 0 {
                write!(f, "{value}{unit}")?;
            }
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            f.write_str("T")?;
            for (value, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if value > 0 {
                    write!(f, "{value}{unit}")?;
                }
            }
        }
        Ok(())
    }
}

/// Parse an ISO 8601 duration (`P[nY][nM][nW][nD][T[nH][nM][nS]]`).
///
/// Only integer components are accepted.
pub fn parse_iso_duration(input: &str) -> Result<IsoDuration> {
    let invalid = |reason: String| Error::invalid_periodicity(input, reason);

    let body = input
        .strip_prefix('P')
        .ok_or_else(|| invalid("duration must start with 'P'".into()))?;
    if body.is_empty() {
        return Err(invalid("duration has no components".into()));
    }

    let mut duration = IsoDuration::default();
    let mut in_time = false;
    let mut saw_component = false;
    let mut digits = String::new();

    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == 'T' && !in_time && digits.is_empty() {
            in_time = true;
            continue;
        }
        if digits.is_empty() {
            return Err(invalid(format!("missing number before '{c}'")));
        }
        let value: u32 = digits
            .parse()
            .map_err(|_| invalid(format!("number too large: {digits}")))?;
        digits.clear();

        let slot = match (in_time, c) {
            (false, 'Y') => &mut duration.years,
            (false, 'M') => &mut duration.months,
            (false, 'W') => &mut duration.weeks,
            (false, 'D') => &mut duration.days,
            (true, 'H') => &mut duration.hours,
            (true, 'M') => &mut duration.minutes,
            (true, 'S') => &mut duration.seconds,
            _ => return Err(invalid(format!("unexpected designator '{c}'"))),
        };
        *slot = value;
        saw_component = true;
    }

    if !digits.is_empty() {
        return Err(invalid(format!("number without unit: {digits}")));
    }
    if !saw_component {
        return Err(invalid("duration has no components".into()));
    }
    Ok(duration)
}

/// Parse an RFC 3339 timestamp into UTC.
///
/// Accepts formats like `"2026-01-12T18:00:00Z"` or with timezone offset.
pub fn parse_absolute_time(input: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::invalid_periodicity(input, format!("invalid timestamp: {e}")))
}
