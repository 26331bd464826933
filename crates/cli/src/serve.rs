//! `cadence serve`: the scheduler loop plus its HTTP server.

use std::{path::Path, sync::Arc};

use {
    anyhow::Context,
    cadence_config::{CadenceConfig, StoreKind},
    cadence_cron::{
        Cron, CronConfig, JobStore, store_file::FileStore, store_memory::InMemoryStore,
        store_sqlite::SqliteStore,
    },
    sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    tokio_util::sync::CancellationToken,
    tracing::{info, info_span, warn},
};

use crate::runner;

type Stores = (Arc<dyn JobStore>, Arc<dyn JobStore>);

/// Open the schedule and log stores for the configured backend.
pub async fn open_stores(kind: StoreKind, data_dir: &Path) -> anyhow::Result<Stores> {
    match kind {
        StoreKind::Memory => {
            warn!("using in-memory stores, jobs will not survive a restart");
            Ok((Arc::new(InMemoryStore::new()), Arc::new(InMemoryStore::new())))
        },
        StoreKind::File => {
            // `destroy` on the schedule store must not remove run output.
            let schedule = FileStore::new(data_dir.join("schedule.cdc"))
                .with_logs_dir(data_dir.join("schedule-logs"))
                .with_span(info_span!("store", name = "schedule"));
            let log = FileStore::new(data_dir.join("log.cdc"))
                .with_logs_dir(data_dir.join("logs"))
                .with_span(info_span!("store", name = "log"));
            Ok((Arc::new(schedule), Arc::new(log)))
        },
        StoreKind::Sqlite => {
            tokio::fs::create_dir_all(data_dir)
                .await
                .with_context(|| format!("failed to create {}", data_dir.display()))?;
            let options = SqliteConnectOptions::new()
                .filename(data_dir.join("cadence.db"))
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await
                .context("failed to open cadence.db")?;
            cadence_cron::run_migrations(&pool).await?;
            Ok((
                Arc::new(SqliteStore::with_pool(pool.clone(), "schedule")),
                Arc::new(SqliteStore::with_pool(pool, "log")),
            ))
        },
    }
}

/// Run until Ctrl-C.
pub async fn run(config: CadenceConfig) -> anyhow::Result<()> {
    let data_dir = cadence_config::data_dir(&config);
    let (schedule, log) = open_stores(config.cron.store, &data_dir).await?;
    info!(store = ?config.cron.store, data_dir = %data_dir.display(), "stores ready");

    let cron = Cron::with_config(
        schedule,
        log,
        runner::factory(config.runner.clone()),
        CronConfig {
            check_interval: config.cron.check_interval(),
            job_timeout: config.cron.job_timeout(),
            ..CronConfig::default()
        },
    );

    let cancel = CancellationToken::new();
    let (addr, server) =
        cadence_gateway::start_server(&config.server.address(), cron.clone(), cancel.clone())
            .await
            .with_context(|| format!("failed to bind {}", config.server.address()))?;
    info!(%addr, "cadence scheduler ready");

    let scheduler = tokio::spawn({
        let cron = Arc::clone(&cron);
        let cancel = cancel.clone();
        async move { cron.start(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    server.await??;
    scheduler.await??;
    Ok(())
}
