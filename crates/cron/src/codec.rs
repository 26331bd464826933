//! Binary encoding shared by the file store, the sqlite store and the HTTP API.
//!
//! Jobs are encoded with bincode's standard configuration over the serde
//! model in [`crate::types`]. Timestamps travel as RFC 3339 strings, the job
//! type as an `i8` and the periodicity as its canonical string. A collection
//! is a [`JobList`] with a single `list` field.

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Error, Result,
    types::{Job, JobList},
};

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(value, bincode::config::standard())?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    if read != bytes.len() {
        return Err(Error::Malformed {
            reason: format!("{} trailing bytes", bytes.len() - read),
        });
    }
    Ok(value)
}

pub fn encode_job(job: &Job) -> Result<Vec<u8>> {
    encode(job)
}

pub fn decode_job(bytes: &[u8]) -> Result<Job> {
    decode(bytes)
}

/// Encode a collection as a [`JobList`].
pub fn encode_jobs(jobs: &[Job]) -> Result<Vec<u8>> {
    encode(&JobList {
        list: jobs.to_vec(),
    })
}

pub fn decode_jobs(bytes: &[u8]) -> Result<Vec<Job>> {
    decode::<JobList>(bytes).map(|list| list.list)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{DatasetOptions, JobOptions, JobType, ShellScriptOptions},
        chrono::{TimeZone, Utc},
    };

    fn base_job(name: &str) -> Job {
        let mut job = Job::new(name, JobType::Dataset, "R/P1W".parse().unwrap());
        job.alias = "me/weather".into();
        job.prev_run_start = Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
        job.run_number = 7;
        job.run_start = Some(Utc.timestamp_nanos(1_709_285_400_123_456_789));
        job.run_stop = Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 31, 0).unwrap());
        job.run_error = "exit status 1".into();
        job.log_file_path = "/tmp/logs/7-weather.log".into();
        job.repo_path = "/home/me/repo".into();
        job
    }

    #[test]
    fn test_dataset_options_survive_encoding() {
        let mut job = base_job("weather");
        job.options = Some(JobOptions::Dataset(DatasetOptions {
            title: "daily weather".into(),
            message: "scheduled refresh".into(),
            recall: "tf".into(),
            body_path: "body.csv".into(),
            file_paths: vec!["meta.json".into(), "structure.json".into()],
            publish: true,
            strict: false,
            force: true,
            keep_format: true,
            should_render: false,
            config: [("region".to_string(), "eu".to_string())].into(),
            secrets: [("token".to_string(), "s3cr3t".to_string())].into(),
        }));

        let bytes = encode_job(&job).unwrap();
        assert_eq!(decode_job(&bytes).unwrap(), job);
    }

    #[test]
    fn test_shell_options_and_absent_options_survive_encoding() {
        let mut shell = base_job("backup.sh");
        shell.job_type = JobType::ShellScript;
        shell.options = Some(JobOptions::ShellScript(ShellScriptOptions::default()));
        let bare = Job::new("bare", JobType::ShellScript, "R/PT1H".parse().unwrap());

        let bytes = encode_jobs(&[shell.clone(), bare.clone()]).unwrap();
        assert_eq!(decode_jobs(&bytes).unwrap(), vec![shell, bare]);
    }

    #[test]
    fn test_empty_list() {
        let bytes = encode_jobs(&[]).unwrap();
        assert!(decode_jobs(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_job(&base_job("weather")).unwrap();
        bytes.push(0);
        let err = decode_job(&bytes).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let bytes = encode_job(&base_job("weather")).unwrap();
        assert!(decode_job(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_unknown_job_type_rejected() {
        let mut job = base_job("weather");
        job.job_type = JobType::ShellScript;
        let mut bytes = encode_job(&job).unwrap();
        // name and alias are length-prefixed strings; the type byte follows them.
        let type_offset = 1 + job.name.len() + 1 + job.alias.len();
        assert_eq!(bytes[type_offset], JobType::ShellScript as u8);
        bytes[type_offset] = 9;
        assert!(decode_job(&bytes).is_err());
    }
}
