//! Binary file-backed store with atomic writes.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    tokio::{fs, sync::Mutex},
    tracing::{Instrument, Span, debug},
};

use crate::{
    Result,
    codec::{decode_jobs, encode_jobs},
    store::{JobStore, LogFile, paginate, upsert, validate_all},
    types::Job,
};

/// File-backed store. The whole collection lives in one encoded file and is
/// rewritten on every mutation. Per-run output goes to `<logs_dir>/<run>.log`.
pub struct FileStore {
    path: PathBuf,
    logs_dir: PathBuf,
    lock: Mutex<()>,
    span: Span,
}

impl FileStore {
    /// Store jobs at `path`, keeping run output in a `logs` directory next to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let logs_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("logs"), |dir| dir.join("logs"));
        Self {
            path,
            logs_dir,
            lock: Mutex::new(()),
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = logs_dir.into();
        self
    }

    /// Emit this store's events under `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    async fn load(&self) -> Result<Vec<Job>> {
        match fs::read(&self.path).await {
            Ok(bytes) => decode_jobs(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic write: write to temp, keep the previous file as `.bak`, rename over target.
    async fn save(&self, jobs: &[Job]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let bytes = encode_jobs(jobs)?;
        let tmp = self.sibling(".tmp");
        fs::write(&tmp, &bytes).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let _ = fs::rename(&self.path, self.sibling(".bak")).await;
        }

        fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), jobs = jobs.len(), "saved job store");
        Ok(())
    }
}

/// File name for a run's output. Job names may be paths, so separators and
/// `..` are flattened to keep every file directly inside the logs directory.
fn log_file_name(run_name: &str) -> String {
    let flat: String = run_name
        .replace("..", "_")
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{flat}.log")
}

async fn remove_if_exists(path: &Path, dir: bool) -> Result<()> {
    let removed = if dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match removed {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[async_trait]
impl JobStore for FileStore {
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        let _guard = self.lock.lock().await;
        let jobs = self.load().instrument(self.span.clone()).await?;
        Ok(paginate(&jobs, offset, limit))
    }

    async fn job(&self, name: &str) -> Result<Job> {
        let _guard = self.lock.lock().await;
        self.load()
            .instrument(self.span.clone())
            .await?
            .into_iter()
            .find(|j| j.name == name)
            .ok_or_else(|| crate::Error::job_not_found(name))
    }

    async fn put_jobs(&self, jobs: &[Job]) -> Result<()> {
        validate_all(jobs)?;
        let _guard = self.lock.lock().await;
        async {
            let mut stored = self.load().await?;
            upsert(&mut stored, jobs);
            self.save(&stored).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn delete_job(&self, name: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        async {
            let mut stored = self.load().await?;
            let before = stored.len();
            stored.retain(|j| j.name != name);
            if stored.len() == before {
                return Ok(());
            }
            self.save(&stored).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn create_log_file(&self, job: &Job) -> Result<Option<LogFile>> {
        fs::create_dir_all(&self.logs_dir).await?;
        let path = self.logs_dir.join(log_file_name(&job.log_name()));
        let file = fs::File::create(&path).await?;
        Ok(Some(LogFile {
            sink: Box::new(file),
            path: path.to_string_lossy().into_owned(),
        }))
    }

    async fn destroy(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        remove_if_exists(&self.path, false).await?;
        remove_if_exists(&self.sibling(".bak"), false).await?;
        remove_if_exists(&self.sibling(".tmp"), false).await?;
        remove_if_exists(&self.logs_dir, true).await
    }
}
