//! Core scheduler: tick loop, job execution and pass-through queries.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    chrono::Utc,
    tokio::time::{Instant, interval_at},
    tokio_util::sync::CancellationToken,
    tracing::{Instrument, Span, debug, error, info, info_span, warn},
};

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

use crate::{
    Result,
    runner::{OutputSink, OutputSource, RunJobFactory, RunJobFn},
    store::{JobStore, LogFile},
    types::Job,
};

#[cfg(feature = "metrics")]
mod cron_metrics {
    /// Total job executions
    pub const EXECUTIONS_TOTAL: &str = "cadence_cron_executions_total";
    /// Job executions that returned an error or timed out
    pub const ERRORS_TOTAL: &str = "cadence_cron_errors_total";
    /// Ticks skipped because the previous pass was still running
    pub const SKIPPED_PASSES_TOTAL: &str = "cadence_cron_skipped_passes_total";
    /// Job execution duration in seconds
    pub const EXECUTION_DURATION_SECONDS: &str = "cadence_cron_execution_duration_seconds";
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct CronConfig {
    /// How often the schedule store is checked for due jobs.
    pub check_interval: Duration,
    /// Upper bound on a single run. `None` lets runs take as long as they need.
    pub job_timeout: Option<Duration>,
    /// Parent span for everything the scheduler logs.
    pub span: Span,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            job_timeout: None,
            span: info_span!("cron"),
        }
    }
}

/// The scheduler.
///
/// Jobs live in the schedule store. Every finished run writes the job back to
/// the schedule store and appends a record named `<run_number>-<name>` to the
/// log store.
pub struct Cron {
    schedule: Arc<dyn JobStore>,
    log: Arc<dyn JobStore>,
    factory: RunJobFactory,
    config: CronConfig,
    pass_running: AtomicBool,
}

/// Clears the busy flag when a check pass ends, even if it panics.
struct PassGuard(Arc<Cron>);

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.pass_running.store(false, Ordering::Release);
    }
}

impl Cron {
    pub fn new(
        schedule: Arc<dyn JobStore>,
        log: Arc<dyn JobStore>,
        factory: RunJobFactory,
    ) -> Arc<Self> {
        Self::with_config(schedule, log, factory, CronConfig::default())
    }

    pub fn with_config(
        schedule: Arc<dyn JobStore>,
        log: Arc<dyn JobStore>,
        factory: RunJobFactory,
        config: CronConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            schedule,
            log,
            factory,
            config,
            pass_running: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CronConfig {
        &self.config
    }

    /// Run the tick loop until `cancel` fires.
    ///
    /// The first check happens one full interval after the call. Each tick
    /// spawns a check pass; a tick that arrives while a pass is still running
    /// is skipped. Cancelling does not interrupt runs already in progress.
    pub async fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let period = self.config.check_interval;
        let span = self.config.span.clone();
        info!(parent: &span, interval_ms = period.as_millis() as u64, "cron scheduler started");

        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.spawn_pass(),
            }
        }

        info!(parent: &span, "cron scheduler stopped");
        Ok(())
    }

    fn spawn_pass(self: &Arc<Self>) {
        if self.pass_running.swap(true, Ordering::AcqRel) {
            debug!(parent: &self.config.span, "previous check pass still running, skipping tick");
            #[cfg(feature = "metrics")]
            counter!(cron_metrics::SKIPPED_PASSES_TOTAL).increment(1);
            return;
        }
        let guard = PassGuard(Arc::clone(self));
        let span = self.config.span.clone();
        tokio::spawn(
            async move {
                guard.0.check_pass().await;
                drop(guard);
            }
            .instrument(span),
        );
    }

    /// Run every due job, one after another, with a single runner.
    async fn check_pass(&self) {
        let jobs = match self.schedule.list_jobs(0, None).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to list scheduled jobs");
                return;
            },
        };

        let now = Utc::now();
        let due: Vec<Job> = jobs.into_iter().filter(|job| job.is_due(now)).collect();
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "running due jobs");

        let pass_token = CancellationToken::new();
        let runner = (self.factory)(pass_token.clone());
        for job in due {
            self.run_job(&runner, job).await;
        }
        pass_token.cancel();
    }

    /// Execute one job and write the results back to both stores.
    ///
    /// Runner failures end up in `run_error` and are never returned.
    /// Returns the log store entry for this run.
    async fn run_job(&self, runner: &RunJobFn, mut job: Job) -> Job {
        let run_start = Utc::now();
        job.run_start = Some(run_start);
        job.run_number += 1;

        let sink: OutputSink = match self.log.create_log_file(&job).await {
            Ok(Some(LogFile { sink, path })) => {
                job.log_file_path = path;
                sink
            },
            Ok(None) => Box::new(tokio::io::sink()),
            Err(e) => {
                warn!(name = %job.name, error = %e, "failed to create log file, discarding output");
                Box::new(tokio::io::sink())
            },
        };

        info!(name = %job.name, run = job.run_number, "executing job");
        #[cfg(feature = "metrics")]
        counter!(cron_metrics::EXECUTIONS_TOTAL).increment(1);

        let started = Instant::now();
        let token = CancellationToken::new();
        let invocation = runner(token.clone(), sink, job.clone());
        let result = match self.config.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(result) => result,
                Err(_) => {
                    token.cancel();
                    Err(anyhow::anyhow!("job timed out after {limit:?}"))
                },
            },
            None => invocation.await,
        };
        let elapsed = started.elapsed();

        match result {
            Ok(()) => job.run_error.clear(),
            Err(e) => {
                warn!(name = %job.name, error = %e, "job failed");
                #[cfg(feature = "metrics")]
                counter!(cron_metrics::ERRORS_TOTAL).increment(1);
                job.run_error = e.to_string();
            },
        }
        job.run_stop = Some(Utc::now());

        #[cfg(feature = "metrics")]
        histogram!(cron_metrics::EXECUTION_DURATION_SECONDS).record(elapsed.as_secs_f64());

        let mut scheduled = job.clone();
        scheduled.log_file_path.clear();
        scheduled.run_start = None;
        scheduled.run_stop = None;
        scheduled.prev_run_start = Some(run_start);

        let mut entry = job;
        entry.name = entry.log_name();

        if let Err(e) = self.schedule.put_job(&scheduled).await {
            error!(name = %scheduled.name, error = %e, "failed to update scheduled job");
        }
        if let Err(e) = self.log.put_job(&entry).await {
            error!(name = %entry.name, error = %e, "failed to write job log");
        }

        info!(
            name = %scheduled.name,
            run = scheduled.run_number,
            duration_ms = elapsed.as_millis() as u64,
            failed = !entry.run_error.is_empty(),
            "job finished"
        );
        entry
    }

    /// Run a scheduled job now, whether or not it is due.
    pub async fn run_now(&self, name: &str) -> Result<Job> {
        let job = self.schedule.job(name).await?;
        let token = CancellationToken::new();
        let runner = (self.factory)(token.clone());
        let entry = self
            .run_job(&runner, job)
            .instrument(self.config.span.clone())
            .await;
        token.cancel();
        Ok(entry)
    }

    pub async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        self.schedule.list_jobs(offset, limit).await
    }

    pub async fn job(&self, name: &str) -> Result<Job> {
        self.schedule.job(name).await
    }

    pub async fn list_logs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        self.log.list_jobs(offset, limit).await
    }

    pub async fn log(&self, log_name: &str) -> Result<Job> {
        self.log.job(log_name).await
    }

    /// Open the captured output of a run. Runs without output read as empty.
    pub async fn log_file(&self, log_name: &str) -> Result<OutputSource> {
        let entry = self.log.job(log_name).await?;
        if entry.log_file_path.is_empty() {
            return Ok(Box::new(tokio::io::empty()));
        }
        let file = tokio::fs::File::open(&entry.log_file_path).await?;
        Ok(Box::new(file))
    }

    /// Validate and add or replace a job.
    pub async fn schedule(&self, job: Job) -> Result<()> {
        job.validate()?;
        self.schedule.put_job(&job).await?;
        info!(parent: &self.config.span, name = %job.name, periodicity = %job.periodicity, "job scheduled");
        Ok(())
    }

    pub async fn unschedule(&self, name: &str) -> Result<()> {
        self.schedule.delete_job(name).await?;
        info!(parent: &self.config.span, name, "job unscheduled");
        Ok(())
    }
}
