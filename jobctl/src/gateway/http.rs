//! Job server gateway over the server's HTTP API.
//!
//! Endpoints:
//! - GET  /api/version - protocol version
//! - POST /api/jobs/ - submit
//! - GET  /api/jobs/ - list
//! - GET  /api/jobs/:id - job details
//! - POST /api/jobs/:id/stop - request stop
//! - GET  /api/jobs/:id/logs - buffered logs
//! - GET  /api/jobs/:id/logs/tail - chunked log stream, closed when the job is terminal

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::{JobGateway, LogStream};
use crate::config::ClientConfig;
use crate::error::{JobError, Result};
use crate::models::{JobInfo, SubmissionId, SubmissionRequest};

/// Response from submitting a job.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    submission_id: Option<String>,
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopResponse {
    stopped: bool,
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    logs: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: Value,
}

/// Whether a request may be replayed after it possibly reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Safe,
    ConnectOnly,
}

/// HTTP client for the job server.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    address: String,
    request_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| JobError::invalid(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            address: config.address.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    fn job_url(&self, submission_id: &str, suffix: &str) -> String {
        self.url(&format!(
            "/api/jobs/{}{suffix}",
            urlencoding::encode(submission_id)
        ))
    }

    /// Send a request, retrying transient failures with exponential backoff.
    async fn send<F>(&self, replay: Replay, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let outcome = build().send().await;

            let transient = match &outcome {
                Ok(resp) => replay == Replay::Safe && is_transient_status(resp.status()),
                Err(e) => e.is_connect() || (replay == Replay::Safe && e.is_timeout()),
            };

            if !transient || attempt >= self.max_retries {
                return outcome.map_err(JobError::from);
            }

            let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
            attempt += 1;
            debug!(attempt, ?delay, address = %self.address, "Retrying job server request");
            tokio::time::sleep(delay).await;
        }
    }

    async fn get_json<T>(&self, url: &str, submission_id: Option<&str>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let resp = self
            .send(Replay::Safe, || {
                self.client.get(url).timeout(self.request_timeout)
            })
            .await?;
        let resp = check(resp, submission_id).await?;
        resp.json().await.map_err(JobError::from)
    }
}

const fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Map a non-success response onto the error taxonomy.
async fn check(resp: Response, submission_id: Option<&str>) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read response text".to_string());

    Err(match status {
        StatusCode::NOT_FOUND => {
            JobError::JobNotFound(submission_id.map_or(message, String::from))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            JobError::InvalidArgument(message)
        }
        s if is_transient_status(s) => JobError::ServerUnavailable(format!("{s}: {message}")),
        s => JobError::Http {
            status: s.as_u16(),
            message,
        },
    })
}

fn parse_version(version: &Value) -> Result<u32> {
    match version {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| JobError::Decode(format!("Bad protocol version: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| JobError::Decode(format!("Bad protocol version: {s}"))),
        other => Err(JobError::Decode(format!("Bad protocol version: {other}"))),
    }
}

#[async_trait]
impl JobGateway for HttpGateway {
    fn address(&self) -> &str {
        &self.address
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionId> {
        let url = self.url("/api/jobs/");
        let resp = self
            .send(Replay::ConnectOnly, || {
                self.client
                    .post(&url)
                    .timeout(self.request_timeout)
                    .json(request)
            })
            .await?;
        let resp = check(resp, request.submission_id.as_deref()).await?;

        let body: SubmitResponse = resp.json().await?;
        body.submission_id
            .or(body.job_id)
            .ok_or_else(|| JobError::Decode("Submit response carried no submission ID".into()))
    }

    async fn get_info(&self, submission_id: &str) -> Result<JobInfo> {
        let url = self.job_url(submission_id, "");
        self.get_json(&url, Some(submission_id)).await
    }

    async fn stop(&self, submission_id: &str) -> Result<bool> {
        let url = self.job_url(submission_id, "/stop");
        let resp = self
            .send(Replay::Safe, || {
                self.client.post(&url).timeout(self.request_timeout)
            })
            .await?;
        let resp = check(resp, Some(submission_id)).await?;

        let body: StopResponse = resp.json().await?;
        Ok(body.stopped)
    }

    async fn fetch_logs(&self, submission_id: &str) -> Result<String> {
        let url = self.job_url(submission_id, "/logs");
        let body: LogsResponse = self.get_json(&url, Some(submission_id)).await?;
        Ok(body.logs)
    }

    async fn stream_logs(&self, submission_id: &str) -> Result<LogStream> {
        let url = self.job_url(submission_id, "/logs/tail");
        // No request timeout: the body stays open for the life of the job.
        let resp = self
            .send(Replay::Safe, || self.client.get(&url))
            .await?;
        let resp = check(resp, Some(submission_id)).await?;

        let mut decoder = Utf8Decoder::default();
        let stream = resp
            .bytes_stream()
            .map(Some)
            .chain(tokio_stream::iter([None]))
            .map(move |chunk| match chunk {
                Some(Ok(bytes)) => Ok(decoder.decode(&bytes)),
                Some(Err(e)) => {
                    warn!(error = %e, "Log stream read failed");
                    Err(JobError::ServerUnavailable(e.to_string()))
                }
                // End of body: emit whatever partial sequence is left.
                None => Ok(decoder.finish()),
            })
            .filter(|chunk| !matches!(chunk, Ok(text) if text.is_empty()));

        Ok(Box::pin(stream))
    }

    async fn list_jobs(&self) -> Result<Vec<JobInfo>> {
        let url = self.url("/api/jobs/");
        self.get_json(&url, None).await
    }

    async fn protocol_version(&self) -> Result<u32> {
        let url = self.url("/api/version");
        let resp = self
            .send(Replay::Safe, || {
                self.client.get(&url).timeout(self.request_timeout)
            })
            .await?;

        // Servers that predate the version endpoint speak protocol 0.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let resp = check(resp, None).await?;

        let body: VersionResponse = resp.json().await?;
        parse_version(&body.version)
    }
}

/// Turns byte chunks into text without splitting multi-byte characters.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut text = String::new();
        let mut rest: &[u8] = &self.pending;
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Incomplete sequence at the end: hold it for the next chunk.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let remaining = rest.to_vec();
        self.pending = remaining;
        text
    }

    /// Drain bytes held back at the end of the stream.
    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}
