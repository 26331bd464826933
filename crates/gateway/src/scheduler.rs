//! The scheduler operation set, shared by in-process and remote schedulers.

use async_trait::async_trait;

use cadence_cron::{Cron, Job, OutputSource};

use crate::error::Result;

/// Everything a host can ask of a scheduler.
///
/// Implemented by [`Cron`] directly and by [`crate::client::HttpClient`] for
/// a scheduler running in another process.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>>;
    async fn job(&self, name: &str) -> Result<Job>;
    async fn list_logs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>>;
    async fn log(&self, log_name: &str) -> Result<Job>;
    /// Captured output of a run; empty when nothing was captured.
    async fn log_file(&self, log_name: &str) -> Result<OutputSource>;
    async fn schedule(&self, job: Job) -> Result<()>;
    async fn unschedule(&self, name: &str) -> Result<()>;
    /// Run a scheduled job now and return its log entry.
    async fn run(&self, name: &str) -> Result<Job>;
}

#[async_trait]
impl Scheduler for Cron {
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        Ok(Cron::list_jobs(self, offset, limit).await?)
    }

    async fn job(&self, name: &str) -> Result<Job> {
        Ok(Cron::job(self, name).await?)
    }

    async fn list_logs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        Ok(Cron::list_logs(self, offset, limit).await?)
    }

    async fn log(&self, log_name: &str) -> Result<Job> {
        Ok(Cron::log(self, log_name).await?)
    }

    async fn log_file(&self, log_name: &str) -> Result<OutputSource> {
        Ok(Cron::log_file(self, log_name).await?)
    }

    async fn schedule(&self, job: Job) -> Result<()> {
        Ok(Cron::schedule(self, job).await?)
    }

    async fn unschedule(&self, name: &str) -> Result<()> {
        Ok(Cron::unschedule(self, name).await?)
    }

    async fn run(&self, name: &str) -> Result<Job> {
        Ok(Cron::run_now(self, name).await?)
    }
}
