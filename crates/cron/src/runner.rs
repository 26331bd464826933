//! Callback types through which the host executes jobs.
//!
//! The scheduler never inspects what a job does. It asks a [`RunJobFactory`]
//! for a [`RunJobFn`] once per check pass and hands each due job to it along
//! with a sink for the run's output.

use std::{future::Future, pin::Pin, sync::Arc};

use {
    tokio::io::{AsyncRead, AsyncWrite},
    tokio_util::sync::CancellationToken,
};

use crate::types::Job;

/// Destination for a run's captured output. The runner must flush it.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Readable side of a run's captured output.
pub type OutputSource = Box<dyn AsyncRead + Send + Unpin>;

pub type RunFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Executes a single job. Errors are recorded verbatim into `run_error`.
pub type RunJobFn = Arc<dyn Fn(CancellationToken, OutputSink, Job) -> RunFuture + Send + Sync>;

/// Produces a runner for one check pass.
pub type RunJobFactory = Arc<dyn Fn(CancellationToken) -> RunJobFn + Send + Sync>;

/// Wrap an async closure as a [`RunJobFn`].
pub fn run_job_fn<F, Fut>(f: F) -> RunJobFn
where
    F: Fn(CancellationToken, OutputSink, Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |token, sink, job| Box::pin(f(token, sink, job)))
}

/// A factory that hands out the same runner for every pass.
pub fn shared_factory(runner: RunJobFn) -> RunJobFactory {
    Arc::new(move |_token| Arc::clone(&runner))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::JobType,
        std::sync::atomic::{AtomicUsize, Ordering},
        tokio::io::AsyncWriteExt,
    };

    #[tokio::test]
    async fn test_shared_factory_reuses_runner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let runner = run_job_fn(move |_token, mut sink, job| {
            let counter = Arc::clone(&counter);
            async move {
                sink.write_all(job.name.as_bytes()).await?;
                sink.flush().await?;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let factory = shared_factory(runner);

        let job = Job::new("nightly", JobType::ShellScript, "R/P1D".parse().unwrap());
        for _ in 0..2 {
            let run = factory(CancellationToken::new());
            run(
                CancellationToken::new(),
                Box::new(tokio::io::sink()),
                job.clone(),
            )
            .await
            .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
