//! Repeating intervals and next-run computation.

use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Deserializer, Serialize, Serializer},
};

use crate::{
    Error, Result,
    parse::{IsoDuration, parse_absolute_time, parse_iso_duration},
};

/// An ISO 8601 repeating interval, e.g. `R/P1W` ("every week, forever").
///
/// Three forms are understood:
///
/// * `R[n]/<duration>`: every `<duration>`, counted from the previous run.
/// * `R[n]/<start>/<duration>`: the series `start`, `start + d`, `start + 2d`, ...
/// * `R[n]/<start>/<end>`: as above, with `d = end - start`.
///
/// The empty string is the zero periodicity, which never fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Periodicity {
    repetitions: Option<u32>,
    start: Option<DateTime<Utc>>,
    duration: IsoDuration,
}

impl Periodicity {
    /// Repeat indefinitely every `duration`.
    #[must_use]
    pub fn every(duration: IsoDuration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Anchor the series on `start`.
    #[must_use]
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Limit the number of repetitions.
    #[must_use]
    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = Some(repetitions);
        self
    }

    #[must_use]
    pub fn repetitions(&self) -> Option<u32> {
        self.repetitions
    }

    #[must_use]
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    #[must_use]
    pub fn duration(&self) -> IsoDuration {
        self.duration
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.duration.is_zero()
    }

    /// Earliest time strictly after `prev` at which the interval fires.
    ///
    /// `prev` is the start of the last completed run, `None` if the job has
    /// never run. Without a start anchor a job that never ran is due
    /// immediately. Returns `None` for the zero periodicity or on overflow.
    /// Repetition limits are not applied here; see [`crate::types::Job::next_exec`].
    #[must_use]
    pub fn next_after(&self, prev: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        if self.is_zero() {
            return None;
        }
        match (self.start, prev) {
            (None, None) => Some(DateTime::<Utc>::UNIX_EPOCH),
            (None, Some(prev)) => self.duration.add_to(prev, 1),
            (Some(start), None) => Some(start),
            (Some(start), Some(prev)) if prev < start => Some(start),
            (Some(start), Some(prev)) => self.series_after(start, prev),
        }
    }

    fn series_after(&self, start: DateTime<Utc>, prev: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let elapsed = (prev - start).num_seconds();
        // Every step is at most `max_step_secs` long, so `start + k * d <= prev`
        // for this `k`; walk forward from there.
        let mut k = u32::try_from(elapsed / self.duration.max_step_secs()).ok()?;
        loop {
            k = k.checked_add(1)?;
            let candidate = self.duration.add_to(start, k)?;
            if candidate > prev {
                return Some(candidate);
            }
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::default() {
            return Ok(());
        }
        f.write_str("R")?;
        if let Some(n) = self.repetitions {
            write!(f, "{n}")?;
        }
        if let Some(start) = self.start {
            write!(f, "/{}", start.to_rfc3339_opts(SecondsFormat::AutoSi, true))?;
        }
        write!(f, "/{}", self.duration)
    }
}

impl FromStr for Periodicity {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let invalid = |reason: &str| Error::invalid_periodicity(input, reason);

        let mut parts = trimmed.split('/');
        let head = parts.next().unwrap_or_default();
        let count = head
            .strip_prefix('R')
            .ok_or_else(|| invalid("repeating interval must start with 'R'"))?;
        let repetitions = if count.is_empty() {
            None
        } else {
            Some(
                count
                    .parse::<u32>()
                    .map_err(|_| invalid("repetition count must be a non-negative integer"))?,
            )
        };

        let rest: Vec<&str> = parts.collect();
        let (start, duration) = match rest.as_slice() {
            [duration] => (None, parse_iso_duration(duration)?),
            [start, duration] if duration.starts_with('P') => {
                (Some(parse_absolute_time(start)?), parse_iso_duration(duration)?)
            },
            [start, end] => {
                let start = parse_absolute_time(start)?;
                let end = parse_absolute_time(end)?;
                let secs = u64::try_from((end - start).num_seconds())
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| invalid("interval end must be after its start"))?;
                let duration = IsoDuration::from_secs(secs)
                    .ok_or_else(|| invalid("interval is too long"))?;
                (Some(start), duration)
            },
            _ => {
                return Err(invalid(
                    "expected R[n]/<duration>, R[n]/<start>/<duration> or R[n]/<start>/<end>",
                ));
            },
        };

        Ok(Self {
            repetitions,
            start,
            duration,
        })
    }
}

impl Serialize for Periodicity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Periodicity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn at(s: &str) -> DateTime<Utc> {
        parse_absolute_time(s).unwrap()
    }

    #[test]
    fn test_weekly_from_previous_run() {
        let p: Periodicity = "R/P1W".parse().unwrap();
        let prev = at("2024-02-01T10:00:00Z");
        assert_eq!(p.next_after(Some(prev)), Some(at("2024-02-08T10:00:00Z")));
    }

    #[test]
    fn test_never_run_is_due_immediately() {
        let p: Periodicity = "R/P1W".parse().unwrap();
        let next = p.next_after(None).unwrap();
        assert!(Utc::now() > next);
    }

    #[test]
    fn test_series_before_start_waits_for_start() {
        let p: Periodicity = "R/2030-01-01T00:00:00Z/P1D".parse().unwrap();
        assert_eq!(p.next_after(None), Some(at("2030-01-01T00:00:00Z")));
        assert_eq!(
            p.next_after(Some(at("2029-06-01T00:00:00Z"))),
            Some(at("2030-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn test_series_steps_past_previous_run() {
        let p: Periodicity = "R/2024-01-01T00:00:00Z/PT6H".parse().unwrap();
        let prev = at("2024-03-10T13:30:00Z");
        assert_eq!(p.next_after(Some(prev)), Some(at("2024-03-10T18:00:00Z")));
    }

    #[test]
    fn test_series_on_boundary_moves_to_next_element() {
        let p: Periodicity = "R/2024-01-01T00:00:00Z/P1D".parse().unwrap();
        let prev = at("2024-01-05T00:00:00Z");
        assert_eq!(p.next_after(Some(prev)), Some(at("2024-01-06T00:00:00Z")));
    }

    #[test]
    fn test_monthly_series_uses_calendar_months() {
        let p: Periodicity = "R/2024-01-31T00:00:00Z/P1M".parse().unwrap();
        let prev = at("2024-04-15T00:00:00Z");
        assert_eq!(p.next_after(Some(prev)), Some(at("2024-04-30T00:00:00Z")));
    }

    #[test]
    fn test_start_end_form() {
        let p: Periodicity = "R/2024-01-01T00:00:00Z/2024-01-02T00:00:00Z"
            .parse()
            .unwrap();
        assert_eq!(p.duration(), IsoDuration::days(1));
        assert_eq!(p.to_string(), "R/2024-01-01T00:00:00Z/P1D");
    }

    #[test]
    fn test_repetitions_parsed() {
        let p: Periodicity = "R5/P1D".parse().unwrap();
        assert_eq!(p.repetitions(), Some(5));
        assert_eq!(p.to_string(), "R5/P1D");
    }

    #[test]
    fn test_empty_is_zero() {
        let p: Periodicity = "".parse().unwrap();
        assert!(p.is_zero());
        assert_eq!(p, Periodicity::default());
        assert_eq!(p.to_string(), "");
        assert_eq!(p.next_after(None), None);
    }

    #[rstest]
    #[case("R/P1W")]
    #[case("R/PT1H")]
    #[case("R3/P1M")]
    #[case("R/2024-05-01T12:00:00Z/P1D")]
    #[case("R/2024-05-01T12:00:00.250Z/PT15M")]
    fn test_display_parse_stable(#[case] input: &str) {
        let p: Periodicity = input.parse().unwrap();
        assert_eq!(p.to_string(), input);
        assert_eq!(p.to_string().parse::<Periodicity>().unwrap(), p);
    }

    #[rstest]
    #[case("P1W")]
    #[case("Rx/P1W")]
    #[case("R/")]
    #[case("R/P1W/P1W/P1W")]
    #[case("R/2024-01-02T00:00:00Z/2024-01-01T00:00:00Z")]
    #[case("R/yesterday/P1D")]
    fn test_invalid(#[case] input: &str) {
        assert!(input.parse::<Periodicity>().is_err(), "{input} should not parse");
    }
}
