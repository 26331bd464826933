//! HTTP surface over a [`Scheduler`].
//!
//! Job bodies use the binary encoding from [`cadence_cron::codec`]. Errors are
//! returned as plain text with the status from [`Error`]'s mapping.

use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        body::{Body, Bytes},
        extract::{Query, State},
        http::{StatusCode, header},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    cadence_cron::{
        Job,
        codec::{decode_job, encode_job, encode_jobs},
    },
    serde::Deserialize,
    tokio::{net::TcpListener, task::JoinHandle},
    tokio_util::{io::ReaderStream, sync::CancellationToken},
    tower_http::trace::TraceLayer,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    scheduler::Scheduler,
};

type AppState = Arc<dyn Scheduler>;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    offset: usize,
    /// Negative means no limit.
    limit: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> Option<usize> {
        self.limit.and_then(|l| usize::try_from(l).ok())
    }
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    log_name: Option<String>,
}

fn required(value: Option<String>, name: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingParam { name })
}

fn encoded(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, OCTET_STREAM)], bytes).into_response()
}

fn encoded_job(job: &Job) -> Result<Response> {
    Ok(encoded(encode_job(job)?))
}

fn encoded_jobs(jobs: &[Job]) -> Result<Response> {
    Ok(encoded(encode_jobs(jobs)?))
}

/// Build the router (shared between production startup and tests).
pub fn build_router(scheduler: Arc<dyn Scheduler>) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route(
            "/jobs",
            get(list_jobs_handler)
                .post(put_job_handler)
                .delete(delete_job_handler),
        )
        .route("/job", get(job_handler))
        .route("/logs", get(list_logs_handler))
        .route("/log", get(log_handler))
        .route("/log/output", get(log_output_handler))
        .route("/run", post(run_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(scheduler)
}

/// Serve on `listener` until `cancel` fires, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    scheduler: Arc<dyn Scheduler>,
    cancel: CancellationToken,
) -> Result<()> {
    let app = build_router(scheduler);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("http server stopped");
    Ok(())
}

/// Bind `addr` and serve in the background.
///
/// Bind errors are returned immediately. The returned address is the bound
/// one, which differs from `addr` when port 0 was requested.
pub async fn start_server(
    addr: &str,
    scheduler: Arc<dyn Scheduler>,
    cancel: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "http server listening");
    let handle = tokio::spawn(serve(listener, scheduler, cancel));
    Ok((local, handle))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn status_handler() -> &'static str {
    "ok"
}

async fn list_jobs_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let jobs = scheduler.list_jobs(query.offset, query.limit()).await?;
    encoded_jobs(&jobs)
}

async fn put_job_handler(State(scheduler): State<AppState>, body: Bytes) -> Result<StatusCode> {
    let job = decode_job(&body)?;
    debug!(name = %job.name, "schedule request");
    scheduler.schedule(job).await?;
    Ok(StatusCode::OK)
}

async fn delete_job_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<StatusCode> {
    let name = required(query.name, "name")?;
    scheduler.unschedule(&name).await?;
    Ok(StatusCode::OK)
}

async fn job_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Response> {
    let name = required(query.name, "name")?;
    encoded_job(&scheduler.job(&name).await?)
}

async fn list_logs_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let logs = scheduler.list_logs(query.offset, query.limit()).await?;
    encoded_jobs(&logs)
}

async fn log_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Response> {
    let log_name = required(query.log_name, "log_name")?;
    encoded_job(&scheduler.log(&log_name).await?)
}

async fn log_output_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Response> {
    let log_name = required(query.log_name, "log_name")?;
    let source = scheduler.log_file(&log_name).await?;
    let body = Body::from_stream(ReaderStream::new(source));
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

async fn run_handler(
    State(scheduler): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Response> {
    let name = required(query.name, "name")?;
    encoded_job(&scheduler.run(&name).await?)
}
