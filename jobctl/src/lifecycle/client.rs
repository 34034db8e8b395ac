//! Caller-facing job client.
//!
//! `JobClient` wires the coordinators to one gateway, clock and reporter.
//! It is cheap to clone; every clone shares the same gateway.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::interceptor::{CommandInterceptor, SubmissionInterceptor};
use super::poller::{PollOptions, StatusPoller};
use super::report::Reporter;
use super::stop::{StopCoordinator, StopOutcome};
use super::submit::SubmissionCoordinator;
use super::tailer::{LogSink, LogTailer};
use crate::clock::{Clock, TokioClock};
use crate::config::ClientConfig;
use crate::error::{JobError, Result};
use crate::gateway::{HttpGateway, JobGateway};
use crate::models::{JobInfo, SubmissionParams, Submitted};

/// How a `logs` request was served.
#[derive(Debug, Clone, PartialEq)]
pub enum LogsOutcome {
    /// The log stream was followed until the job finished.
    Followed(JobInfo),
    /// A one-shot snapshot was printed.
    Snapshot,
}

#[derive(Clone)]
pub struct JobClient {
    gateway: Arc<dyn JobGateway>,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn Reporter>,
    interceptor: Option<Arc<dyn SubmissionInterceptor>>,
    poll_interval: Duration,
}

impl JobClient {
    pub fn new(gateway: Arc<dyn JobGateway>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            gateway,
            clock: Arc::new(TokioClock::new()),
            reporter,
            interceptor: None,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Client over HTTP with the configured interval and submit hook.
    pub fn from_config(config: &ClientConfig, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let gateway = Arc::new(HttpGateway::new(config)?);
        let mut client = Self::new(gateway, reporter).with_poll_interval(config.poll_interval());
        if let Some(hook) = CommandInterceptor::from_config(config)? {
            client = client.with_interceptor(Arc::new(hook));
        }
        Ok(client)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn SubmissionInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn address(&self) -> &str {
        self.gateway.address()
    }

    /// Poll options at the client's interval, bound to `cancel`.
    pub fn poll_options(&self, cancel: &CancellationToken) -> PollOptions {
        PollOptions::default()
            .with_interval(self.poll_interval)
            .with_cancel(cancel.clone())
    }

    fn poller(&self) -> StatusPoller {
        StatusPoller::new(
            self.gateway.clone(),
            self.clock.clone(),
            self.reporter.clone(),
        )
    }

    fn tailer(&self) -> LogTailer {
        LogTailer::new(self.gateway.clone(), self.reporter.clone())
    }

    pub async fn submit_job(&self, params: &SubmissionParams) -> Result<Submitted> {
        let mut coordinator = SubmissionCoordinator::new(self.gateway.clone());
        if let Some(interceptor) = &self.interceptor {
            coordinator = coordinator.with_interceptor(interceptor.clone());
        }

        let submitted = coordinator.submit(params).await?;
        for deprecation in &submitted.deprecations {
            self.reporter.notice(&deprecation.to_string());
        }
        Ok(submitted)
    }

    /// Fetch and report the current status once.
    pub async fn get_job_status(&self, submission_id: &str) -> Result<JobInfo> {
        let info = self.poller().get_current_info(submission_id).await?;
        self.reporter.final_status(&info);
        Ok(info)
    }

    /// Wait for the job to finish, then report its final status.
    pub async fn wait_for_job(&self, submission_id: &str, options: &PollOptions) -> Result<JobInfo> {
        let info = self
            .poller()
            .get_terminal_status(submission_id, options)
            .await?;
        self.reporter.final_status(&info);
        Ok(info)
    }

    pub async fn stop_job(
        &self,
        submission_id: &str,
        wait: bool,
        options: &PollOptions,
    ) -> Result<StopOutcome> {
        StopCoordinator::new(
            self.gateway.clone(),
            self.clock.clone(),
            self.reporter.clone(),
        )
        .stop(submission_id, wait, options)
        .await
    }

    pub async fn tail_job_logs<S>(
        &self,
        submission_id: &str,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<JobInfo>
    where
        S: LogSink + ?Sized,
    {
        self.tailer().stream_to(submission_id, sink, cancel).await
    }

    pub async fn get_job_logs_snapshot(&self, submission_id: &str) -> Result<String> {
        self.gateway.fetch_logs(submission_id).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobInfo>> {
        self.gateway.list_jobs().await
    }

    pub async fn protocol_version(&self) -> Result<u32> {
        self.gateway.protocol_version().await
    }

    /// Follow a job's logs, or print a snapshot when the server cannot stream.
    pub async fn follow_logs<S>(
        &self,
        submission_id: &str,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<LogsOutcome>
    where
        S: LogSink + ?Sized,
    {
        match self.tail_job_logs(submission_id, &mut *sink, cancel).await {
            Ok(info) => Ok(LogsOutcome::Followed(info)),
            Err(JobError::UnsupportedProtocol { required, actual }) => {
                debug!(required, actual, "Log streaming unavailable, fetching snapshot");
                self.reporter.notice(&format!(
                    "Tailing logs is not supported by this job server (protocol version {actual}, \
                     need {required}). Showing the current logs instead."
                ));
                let logs = self.get_job_logs_snapshot(submission_id).await?;
                sink.write_chunk(&logs);
                Ok(LogsOutcome::Snapshot)
            }
            Err(e) => Err(e),
        }
    }

    /// Tail a job on its own task.
    ///
    /// The tail gets a child of `parent`: cancelling the parent stops every
    /// tail spawned from it, cancelling the returned handle stops only this one.
    pub fn spawn_tail<S>(
        &self,
        submission_id: impl Into<String>,
        mut sink: S,
        parent: &CancellationToken,
    ) -> TailHandle
    where
        S: LogSink + 'static,
    {
        let submission_id = submission_id.into();
        let cancel = parent.child_token();
        let token = cancel.clone();
        let tailer = self.tailer();

        debug!(%submission_id, "Spawning log tail");
        let task = tokio::spawn(async move {
            tailer.stream_to(&submission_id, &mut sink, &token).await
        });

        TailHandle { cancel, task }
    }
}

/// A log tail running on its own task.
pub struct TailHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<JobInfo>>,
}

impl TailHandle {
    /// Stop this tail only.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the tail to finish.
    pub async fn join(self) -> Result<JobInfo> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(JobError::Cancelled(format!("log tail task: {e}"))),
        }
    }
}
