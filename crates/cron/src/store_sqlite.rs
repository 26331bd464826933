//! SQLite-backed job store using sqlx.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{
    Error, Result,
    codec::{decode_job, encode_job},
    store::{JobStore, validate_all},
    types::Job,
};

/// SQLite-backed persistence. Several stores can share one database by using
/// different namespaces.
pub struct SqliteStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteStore {
    /// Create a new store with its own connection pool and run migrations.
    ///
    /// For a shared pool use [`SqliteStore::with_pool`] after calling
    /// [`crate::run_migrations`].
    pub async fn new(database_url: &str, namespace: impl Into<String>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self::with_pool(pool, namespace))
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Nanosecond ordering key, matching the in-process comparison. Instants
/// outside the representable range (before 1677, after 2262) saturate.
fn order_key(job: &Job) -> i64 {
    job.run_start.map_or(i64::MIN, |t| {
        t.timestamp_nanos_opt()
            .unwrap_or(if t.timestamp() < 0 { i64::MIN + 1 } else { i64::MAX })
    })
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, to_i64);
        let rows = sqlx::query(
            "SELECT data FROM cron_jobs
             WHERE namespace = ?
             ORDER BY run_start_ns DESC, name ASC
             LIMIT ? OFFSET ?",
        )
        .bind(&self.namespace)
        .bind(limit)
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| decode_job(row.get::<&[u8], _>("data")))
            .collect()
    }

    async fn job(&self, name: &str) -> Result<Job> {
        let row = sqlx::query("SELECT data FROM cron_jobs WHERE namespace = ? AND name = ?")
            .bind(&self.namespace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::job_not_found(name))?;
        decode_job(row.get::<&[u8], _>("data"))
    }

    async fn put_jobs(&self, jobs: &[Job]) -> Result<()> {
        validate_all(jobs)?;
        let mut tx = self.pool.begin().await?;
        for job in jobs {
            let data = encode_job(job)?;
            sqlx::query(
                "INSERT INTO cron_jobs (namespace, name, run_start_ns, data) VALUES (?, ?, ?, ?)
                 ON CONFLICT(namespace, name) DO UPDATE SET
                    run_start_ns = excluded.run_start_ns,
                    data = excluded.data",
            )
            .bind(&self.namespace)
            .bind(&job.name)
            .bind(order_key(job))
            .bind(data)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM cron_jobs WHERE namespace = ? AND name = ?")
            .bind(&self.namespace)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        sqlx::query("DELETE FROM cron_jobs WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::JobType,
        chrono::{TimeZone, Utc},
    };

    async fn make_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn make_job(name: &str) -> Job {
        Job::new(name, JobType::Dataset, "R/P1W".parse().unwrap())
    }

    #[tokio::test]
    async fn test_sqlite_upsert() {
        let store = SqliteStore::with_pool(make_pool().await, "schedule");
        store.put_job(&make_job("1")).await.unwrap();

        let mut job = make_job("1");
        job.alias = "updated".into();
        store.put_job(&job).await.unwrap();

        let jobs = store.list_jobs(0, None).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].alias, "updated");
    }

    #[tokio::test]
    async fn test_sqlite_namespaces_are_isolated() {
        let pool = make_pool().await;
        let schedule = SqliteStore::with_pool(pool.clone(), "schedule");
        let log = SqliteStore::with_pool(pool, "log");

        schedule.put_job(&make_job("nightly")).await.unwrap();
        log.put_job(&make_job("1-nightly")).await.unwrap();

        assert!(log.job("nightly").await.unwrap_err().is_not_found());
        log.destroy().await.unwrap();
        assert!(log.list_jobs(0, None).await.unwrap().is_empty());
        assert_eq!(schedule.list_jobs(0, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_order_and_page() {
        let store = SqliteStore::with_pool(make_pool().await, "log");
        let mut jobs = Vec::new();
        for (name, secs) in [("a", Some(5)), ("b", None), ("c", Some(9))] {
            let mut job = make_job(name);
            job.run_start = secs.map(|s| Utc.timestamp_opt(s, 0).unwrap());
            jobs.push(job);
        }
        store.put_jobs(&jobs).await.unwrap();

        let names: Vec<_> = store
            .list_jobs(0, None)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, ["c", "a", "b"]);

        let page = store.list_jobs(1, Some(1)).await.unwrap();
        assert_eq!(page[0].name, "a");
    }

    #[tokio::test]
    async fn test_sqlite_orders_sub_microsecond_starts() {
        let store = SqliteStore::with_pool(make_pool().await, "log");
        let base = Utc.timestamp_opt(1_700_000_000, 100).unwrap();
        let mut jobs = Vec::new();
        for (name, extra_ns) in [("a", 500), ("b", 0)] {
            let mut job = make_job(name);
            job.run_start = Some(base + chrono::Duration::nanoseconds(extra_ns));
            jobs.push(job);
        }
        store.put_jobs(&jobs).await.unwrap();

        let mut expected = jobs.clone();
        crate::types::sort_jobs(&mut expected);
        let names: Vec<_> = store
            .list_jobs(0, None)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(names, expected.iter().map(|j| j.name.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn test_order_key_saturates_out_of_range() {
        let mut job = make_job("old");
        assert_eq!(order_key(&job), i64::MIN);
        job.run_start = Some(Utc.with_ymd_and_hms(1500, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(order_key(&job), i64::MIN + 1);
        job.run_start = Some(Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(order_key(&job), i64::MAX);
    }

    #[tokio::test]
    async fn test_sqlite_rejects_invalid_batch() {
        let store = SqliteStore::with_pool(make_pool().await, "schedule");
        let err = store
            .put_jobs(&[make_job("ok"), Job::default()])
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(store.list_jobs(0, None).await.unwrap().is_empty());
    }
}
