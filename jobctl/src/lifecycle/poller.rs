//! Status polling until a job reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::report::Reporter;
use crate::clock::Clock;
use crate::error::{JobError, Result};
use crate::gateway::JobGateway;
use crate::models::JobInfo;

/// Cadence and bounds of a polling wait.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay between consecutive status requests.
    pub interval: Duration,
    /// Give up after this long. `None` waits until the job is done.
    pub timeout: Option<Duration>,
    /// Abandons the wait; the job itself is left untouched.
    pub cancel: CancellationToken,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl PollOptions {
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Drives repeated status requests for one job.
pub struct StatusPoller {
    gateway: Arc<dyn JobGateway>,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn Reporter>,
}

impl StatusPoller {
    pub fn new(
        gateway: Arc<dyn JobGateway>,
        clock: Arc<dyn Clock>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            gateway,
            clock,
            reporter,
        }
    }

    /// One status request, no waiting.
    pub async fn get_current_info(&self, submission_id: &str) -> Result<JobInfo> {
        self.gateway.get_info(submission_id).await
    }

    /// Poll once per interval until the job is terminal.
    ///
    /// Every non-terminal observation is passed to the reporter as progress.
    /// The returned info is always terminal. A zero interval is rejected
    /// before any request is made.
    #[instrument(skip(self, options), fields(interval = ?options.interval))]
    pub async fn get_terminal_status(
        &self,
        submission_id: &str,
        options: &PollOptions,
    ) -> Result<JobInfo> {
        if options.interval.is_zero() {
            return Err(JobError::invalid("Poll interval must be positive"));
        }
        let started = self.clock.elapsed();
        let mut polls: u32 = 0;

        loop {
            let info = tokio::select! {
                biased;
                () = options.cancel.cancelled() => return Err(cancelled(submission_id)),
                info = self.gateway.get_info(submission_id) => info?,
            };
            polls += 1;

            if info.is_terminal() {
                debug!(polls, status = %info.status, "Job reached terminal state");
                return Ok(info);
            }

            debug!(polls, status = %info.status, "Job has not exited yet");
            self.reporter.progress(&info);

            let mut delay = options.interval;
            if let Some(timeout) = options.timeout {
                let waited = self.clock.elapsed().saturating_sub(started);
                if waited >= timeout {
                    return Err(JobError::DeadlineExceeded {
                        submission_id: submission_id.to_string(),
                        waited,
                    });
                }
                delay = delay.min(timeout - waited);
            }

            tokio::select! {
                biased;
                () = options.cancel.cancelled() => return Err(cancelled(submission_id)),
                () = self.clock.sleep(delay) => {}
            }
        }
    }
}

fn cancelled(submission_id: &str) -> JobError {
    JobError::Cancelled(format!("waiting for job '{submission_id}'"))
}
