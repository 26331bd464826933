//! HTTP client for a scheduler served by [`crate::server`].

use {
    async_trait::async_trait,
    futures::TryStreamExt,
    reqwest::{Response, StatusCode, Url, header},
    tokio_util::io::StreamReader,
    tracing::debug,
};

use cadence_cron::{
    Job, OutputSource,
    codec::{decode_job, decode_jobs, encode_job},
};

use crate::{
    error::{Error, Result},
    scheduler::Scheduler,
};

/// Remote [`Scheduler`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpClient {
    /// `address` is either `host:port` or a full `http(s)://` URL.
    pub fn new(address: &str) -> Result<Self> {
        let address = address.trim();
        let invalid = |reason: String| Error::InvalidAddress {
            address: address.to_string(),
            reason,
        };
        if address.is_empty() {
            return Err(invalid("address is empty".into()));
        }
        let with_scheme = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let mut base = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
        if base.host_str().is_none() {
            return Err(invalid("missing host".into()));
        }
        // Routes are joined relative to the base, so its path must end in `/`.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            http: reqwest::Client::new(),
        })
    }

    pub fn address(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidAddress {
            address: self.base.to_string(),
            reason: e.to_string(),
        })
    }

    /// Check that a scheduler is listening.
    ///
    /// Returns [`Error::Unreachable`] when the connection itself fails, so a
    /// caller can start a scheduler instead of giving up.
    pub async fn ping(&self) -> Result<()> {
        let resp = self
            .http
            .get(self.url("/")?)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Unreachable {
                        address: self.base.to_string(),
                    }
                } else {
                    Error::Http(e)
                }
            })?;
        check(resp).await?;
        Ok(())
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        debug!(path, "GET");
        let resp = self.http.get(self.url(path)?).query(query).send().await?;
        check(resp).await
    }

    async fn list(&self, path: &str, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        let mut query = vec![("offset", offset.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let body = self.get(path, &query).await?.bytes().await?;
        Ok(decode_jobs(&body)?)
    }

    async fn lookup(&self, path: &str, key: &str, name: &str) -> Result<Job> {
        let resp = self
            .get(path, &[(key, name.to_string())])
            .await
            .map_err(|e| not_found_as_cron(e, name))?;
        Ok(decode_job(&resp.bytes().await?)?)
    }
}

/// Turn non-success responses into [`Error::Status`] carrying the body text.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        message,
    })
}

fn not_found_as_cron(error: Error, name: &str) -> Error {
    match error {
        Error::Status { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            Error::Cron(cadence_cron::Error::job_not_found(name))
        },
        other => other,
    }
}

#[async_trait]
impl Scheduler for HttpClient {
    async fn list_jobs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        self.list("/jobs", offset, limit).await
    }

    async fn job(&self, name: &str) -> Result<Job> {
        self.lookup("/job", "name", name).await
    }

    async fn list_logs(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Job>> {
        self.list("/logs", offset, limit).await
    }

    async fn log(&self, log_name: &str) -> Result<Job> {
        self.lookup("/log", "log_name", log_name).await
    }

    async fn log_file(&self, log_name: &str) -> Result<OutputSource> {
        let resp = self
            .get("/log/output", &[("log_name", log_name.to_string())])
            .await
            .map_err(|e| not_found_as_cron(e, log_name))?;
        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn schedule(&self, job: Job) -> Result<()> {
        let body = encode_job(&job)?;
        let resp = self
            .http
            .post(self.url("/jobs")?)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn unschedule(&self, name: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url("/jobs")?)
            .query(&[("name", name)])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn run(&self, name: &str) -> Result<Job> {
        let resp = self
            .http
            .post(self.url("/run")?)
            .query(&[("name", name)])
            .send()
            .await?;
        let resp = check(resp)
            .await
            .map_err(|e| not_found_as_cron(e, name))?;
        Ok(decode_job(&resp.bytes().await?)?)
    }
}
