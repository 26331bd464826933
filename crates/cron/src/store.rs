//! Persistence trait for jobs, plus helpers shared by the implementations.

use async_trait::async_trait;

use crate::{
    Error, Result,
    runner::OutputSink,
    types::{Job, sort_jobs},
};

/// A writable destination for one run's output, and where it lives.
pub struct LogFile {
    pub sink: OutputSink,
    pub path: String,
}

/// Persistence backend for a collection of jobs keyed by name.
///
/// Listings are ordered by descending `run_start` with ties broken by name.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// List jobs, skipping `offset` and returning at most `limit` (`None` = all).
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>>;

    /// Fetch a job by name, failing with [`Error::JobNotFound`].
    async fn job(&self, name: &str) -> Result<Job>;

    /// Validate every job, then upsert each by name. Nothing is written if
    /// any job is invalid. Later duplicates within `jobs` win.
    async fn put_jobs(&self, jobs: &[Job]) -> Result<()>;

    async fn put_job(&self, job: &Job) -> Result<()> {
        self.put_jobs(std::slice::from_ref(job)).await
    }

    /// Remove a job. Removing an unknown name is not an error.
    async fn delete_job(&self, name: &str) -> Result<()>;

    /// Open a durable output file for the job's current run.
    ///
    /// `None` means the store does not capture output and the run's output
    /// is discarded.
    async fn create_log_file(&self, _job: &Job) -> Result<Option<LogFile>> {
        Ok(None)
    }

    /// Wipe every job and any captured output.
    async fn destroy(&self) -> Result<()> {
        Err(Error::unsupported("destroy"))
    }
}

pub(crate) fn validate_all(jobs: &[Job]) -> Result<()> {
    jobs.iter().try_for_each(Job::validate)
}

/// Upsert `incoming` into `jobs` by name and restore store order.
pub(crate) fn upsert(jobs: &mut Vec<Job>, incoming: &[Job]) {
    for job in incoming {
        match jobs.iter_mut().find(|existing| existing.name == job.name) {
            Some(existing) => *existing = job.clone(),
            None => jobs.push(job.clone()),
        }
    }
    sort_jobs(jobs);
}

pub(crate) fn paginate(jobs: &[Job], offset: usize, limit: Option<usize>) -> Vec<Job> {
    let rest = jobs.iter().skip(offset);
    match limit {
        Some(limit) => rest.take(limit).cloned().collect(),
        None => rest.cloned().collect(),
    }
}
