//! Periodic job scheduling.
//!
//! Jobs repeat on ISO 8601 intervals (`R/P1W`). A [`Cron`] checks a schedule
//! store on a fixed interval, hands due jobs to a host-provided runner and
//! records every run in a log store. Stores come in memory, file and SQLite
//! flavours and share one binary encoding.

pub mod codec;
pub mod error;
pub mod parse;
pub mod runner;
pub mod schedule;
pub mod service;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result},
    runner::{OutputSink, OutputSource, RunJobFactory, RunJobFn},
    schedule::Periodicity,
    service::{Cron, CronConfig},
    store::{JobStore, LogFile},
    types::{DatasetOptions, Job, JobOptions, JobType, ShellScriptOptions},
};

/// Run database migrations for the cron crate.
///
/// Creates the `cron_jobs` table. Call this before
/// [`store_sqlite::SqliteStore::with_pool`] on a shared pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
