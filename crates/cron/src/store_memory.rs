//! In-memory store for tests and ephemeral schedulers.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    Error, Result,
    store::{JobStore, paginate, upsert, validate_all},
    types::Job,
};

/// In-memory store backed by a sorted `Vec`. No persistence.
#[derive(Default)]
pub struct InMemoryStore {
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(paginate(&jobs, offset, limit))
    }

    async fn job(&self, name: &str) -> Result<Job> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.iter()
            .find(|j| j.name == name)
            .cloned()
            .ok_or_else(|| Error::job_not_found(name))
    }

    async fn put_jobs(&self, jobs: &[Job]) -> Result<()> {
        validate_all(jobs)?;
        let mut stored = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        upsert(&mut stored, jobs);
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.retain(|j| j.name != name);
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::types::JobType};

    fn make_job(name: &str) -> Job {
        Job::new(name, JobType::ShellScript, "R/PT1H".parse().unwrap())
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = InMemoryStore::new();
        store.put_job(&make_job("1")).await.unwrap();
        assert_eq!(store.job("1").await.unwrap(), make_job("1"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        store.put_job(&make_job("1")).await.unwrap();
        store.delete_job("1").await.unwrap();
        store.delete_job("1").await.unwrap();
        assert!(store.list_jobs(0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_log_file() {
        let store = InMemoryStore::new();
        assert!(store.create_log_file(&make_job("1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy_clears() {
        let store = InMemoryStore::new();
        store.put_job(&make_job("1")).await.unwrap();
        store.destroy().await.unwrap();
        assert!(store.job("1").await.unwrap_err().is_not_found());
    }
}
