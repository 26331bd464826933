//! Core data types for the job scheduler.

use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Deserializer, Serialize, Serializer},
};

use crate::{Error, Result, schedule::Periodicity};

/// What kind of work a job represents. Encoded as an `i8`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum JobType {
    /// Not set. Never valid for a stored job.
    #[default]
    Unspecified = 0,
    /// Refresh a dataset.
    Dataset = 1,
    /// Run a shell script.
    ShellScript = 2,
}

impl JobType {
    fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Dataset),
            2 => Some(Self::ShellScript),
            _ => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Dataset => "dataset",
            Self::ShellScript => "shell",
        })
    }
}

impl FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dataset" => Ok(Self::Dataset),
            "shell" | "shell-script" => Ok(Self::ShellScript),
            other => Err(Error::invalid_job(format!("unknown job type: {other}"))),
        }
    }
}

impl Serialize for JobType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i8(*self as i8)
    }
}

impl<'de> Deserialize<'de> for JobType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = i8::deserialize(deserializer)?;
        Self::from_i8(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown job type: {raw}")))
    }
}

/// Options for a dataset refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOptions {
    pub title: String,
    pub message: String,
    /// Pointer to previous transform or viz to reuse.
    pub recall: String,
    pub body_path: String,
    pub file_paths: Vec<String>,
    pub publish: bool,
    pub strict: bool,
    pub force: bool,
    pub keep_format: bool,
    pub should_render: bool,
    pub config: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
}

/// Options for a shell script. Currently empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellScriptOptions {}

/// Kind-specific job options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOptions {
    Dataset(DatasetOptions),
    ShellScript(ShellScriptOptions),
}

/// A recurring unit of work.
///
/// In the schedule store a job is at rest: `run_start`, `run_stop` are `None`
/// and `log_file_path` is empty. Log store entries keep every run field and
/// carry the run name (see [`Job::log_name`]) in `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub alias: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub periodicity: Periodicity,
    /// Start of the last completed run.
    pub prev_run_start: Option<DateTime<Utc>>,
    pub run_number: i64,
    pub run_start: Option<DateTime<Utc>>,
    pub run_stop: Option<DateTime<Utc>>,
    pub run_error: String,
    pub log_file_path: String,
    pub repo_path: String,
    pub options: Option<JobOptions>,
}

impl Job {
    /// Create a job with the required fields set.
    #[must_use]
    pub fn new(name: impl Into<String>, job_type: JobType, periodicity: Periodicity) -> Self {
        Self {
            name: name.into(),
            job_type,
            periodicity,
            ..Self::default()
        }
    }

    /// Reject jobs that must never be persisted.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_job("name is required"));
        }
        if self.periodicity.is_zero() {
            return Err(Error::invalid_job(format!(
                "job '{}': periodicity is required",
                self.name
            )));
        }
        if self.job_type == JobType::Unspecified {
            return Err(Error::invalid_job(format!(
                "job '{}': type is required",
                self.name
            )));
        }
        Ok(())
    }

    /// Next time this job should run, `None` if it never will again.
    #[must_use]
    pub fn next_exec(&self) -> Option<DateTime<Utc>> {
        if let Some(limit) = self.periodicity.repetitions()
            && self.run_number >= i64::from(limit)
        {
            return None;
        }
        self.periodicity.next_after(self.prev_run_start)
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_exec().is_some_and(|next| now > next)
    }

    /// Name of the log store entry for the current run number, e.g. `3-nightly`.
    #[must_use]
    pub fn log_name(&self) -> String {
        format!("{}-{}", self.run_number, self.name)
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }
}

/// Store order: most recent `run_start` first, jobs that never started last,
/// ties broken by ascending name.
pub fn compare_jobs(a: &Job, b: &Job) -> Ordering {
    b.run_start
        .cmp(&a.run_start)
        .then_with(|| a.name.cmp(&b.name))
}

pub fn sort_jobs(jobs: &mut [Job]) {
    jobs.sort_by(compare_jobs);
}

/// Wire and on-disk wrapper for a collection of jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    pub list: Vec<Job>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::{Duration, TimeZone},
    };

    fn weekly() -> Periodicity {
        "R/P1W".parse().unwrap()
    }

    #[test]
    fn test_validate_rejects_empty_job() {
        assert!(Job::default().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_periodicity() {
        let job = Job::new("nightly", JobType::ShellScript, Periodicity::default());
        let err = job.validate().unwrap_err();
        assert!(err.to_string().contains("periodicity"));
    }

    #[test]
    fn test_validate_rejects_missing_type() {
        let job = Job::new("nightly", JobType::Unspecified, weekly());
        let err = job.validate().unwrap_err();
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn test_validate_accepts_complete_job() {
        Job::new("nightly", JobType::Dataset, weekly())
            .validate()
            .unwrap();
    }

    #[test]
    fn test_never_run_job_is_due() {
        let job = Job::new("nightly", JobType::ShellScript, weekly());
        assert!(job.is_due(Utc::now()));
    }

    #[test]
    fn test_recent_run_is_not_due() {
        let now = Utc::now();
        let mut job = Job::new("nightly", JobType::ShellScript, weekly());
        job.prev_run_start = Some(now - Duration::days(1));
        assert!(!job.is_due(now));
        assert!(job.is_due(now + Duration::days(7)));
    }

    #[test]
    fn test_repetitions_exhausted() {
        let mut job = Job::new(
            "twice",
            JobType::ShellScript,
            "R2/P1D".parse().unwrap(),
        );
        job.run_number = 2;
        assert_eq!(job.next_exec(), None);
        assert!(!job.is_due(Utc::now()));
    }

    #[test]
    fn test_log_name() {
        let mut job = Job::new("nightly", JobType::ShellScript, weekly());
        job.run_number = 12;
        assert_eq!(job.log_name(), "12-nightly");
    }

    #[test]
    fn test_sort_order() {
        let t = |secs| Some(Utc.timestamp_opt(secs, 0).unwrap());
        let mut jobs = vec![
            Job {
                name: "b".into(),
                run_start: t(10),
                ..Job::default()
            },
            Job {
                name: "never".into(),
                ..Job::default()
            },
            Job {
                name: "c".into(),
                run_start: t(20),
                ..Job::default()
            },
            Job {
                name: "a".into(),
                run_start: t(10),
                ..Job::default()
            },
        ];
        sort_jobs(&mut jobs);
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b", "never"]);
    }

    #[test]
    fn test_job_type_from_str() {
        assert_eq!("dataset".parse::<JobType>().unwrap(), JobType::Dataset);
        assert_eq!("shell".parse::<JobType>().unwrap(), JobType::ShellScript);
        assert!("cron".parse::<JobType>().is_err());
    }
}
