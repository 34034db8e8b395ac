//! Stop requests with optional wait for the job to exit.

use std::sync::Arc;

use tracing::{info, instrument};

use super::poller::{PollOptions, StatusPoller};
use super::report::Reporter;
use crate::clock::Clock;
use crate::error::Result;
use crate::gateway::JobGateway;
use crate::models::JobInfo;

/// What a stop call ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Stop was requested and not waited on. `stopped` is whether the
    /// server had a live job to stop.
    Requested { stopped: bool },
    /// The job was observed terminal after the stop request.
    Finished(JobInfo),
}

pub struct StopCoordinator {
    gateway: Arc<dyn JobGateway>,
    poller: StatusPoller,
    reporter: Arc<dyn Reporter>,
}

impl StopCoordinator {
    pub fn new(
        gateway: Arc<dyn JobGateway>,
        clock: Arc<dyn Clock>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            poller: StatusPoller::new(gateway.clone(), clock, reporter.clone()),
            gateway,
            reporter,
        }
    }

    /// Issue exactly one stop request, then optionally wait for the job to exit.
    ///
    /// Every status considered for the final report is fetched after the
    /// stop request returned. Cancelling the wait leaves the stop request in
    /// effect.
    #[instrument(skip(self, options))]
    pub async fn stop(
        &self,
        submission_id: &str,
        wait: bool,
        options: &PollOptions,
    ) -> Result<StopOutcome> {
        info!("Attempting to stop job");
        let stopped = self.gateway.stop(submission_id).await?;

        if !wait {
            return Ok(StopOutcome::Requested { stopped });
        }

        info!("Waiting for job to exit");
        let info = self
            .poller
            .get_terminal_status(submission_id, options)
            .await?;
        self.reporter.final_status(&info);
        Ok(StopOutcome::Finished(info))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::JobError;
    use crate::gateway::mock::ScriptedGateway;
    use crate::lifecycle::report::recording::RecordingReporter;
    use crate::lifecycle::report::{render_final, Severity};
    use crate::models::JobStatus;

    fn coordinator(
        gateway: &Arc<ScriptedGateway>,
        clock: &Arc<ManualClock>,
        reporter: &Arc<RecordingReporter>,
    ) -> StopCoordinator {
        StopCoordinator::new(gateway.clone(), clock.clone(), reporter.clone())
    }

    #[tokio::test]
    async fn no_wait_makes_one_call() {
        let gateway = Arc::new(
            ScriptedGateway::new().with_statuses("s1", [JobStatus::Running, JobStatus::Stopped]),
        );
        let clock = Arc::new(ManualClock::new());
        let reporter = Arc::new(RecordingReporter::default());

        let outcome = coordinator(&gateway, &clock, &reporter)
            .stop("s1", false, &PollOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, StopOutcome::Requested { stopped: true });
        assert_eq!(gateway.total_calls(), 1);
        assert_eq!(gateway.calls("stop"), 1);
        assert!(clock.sleeps().is_empty());
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn wait_polls_until_stopped_and_warns() {
        let gateway = Arc::new(ScriptedGateway::new().with_statuses(
            "s1",
            [JobStatus::Running, JobStatus::Running, JobStatus::Stopped],
        ));
        let clock = Arc::new(ManualClock::new());
        let reporter = Arc::new(RecordingReporter::default());

        let outcome = coordinator(&gateway, &clock, &reporter)
            .stop("s1", true, &PollOptions::default())
            .await
            .unwrap();

        assert_eq!(
            gateway.call_log(),
            vec!["stop", "get_info", "get_info", "get_info"]
        );
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 2]);
        assert_eq!(reporter.progress_count(), 2);

        let StopOutcome::Finished(info) = outcome else {
            panic!("expected a finished outcome");
        };
        assert_eq!(info.status, JobStatus::Stopped);

        let finals = reporter.finals();
        assert_eq!(finals.len(), 1);
        assert_eq!(render_final(&finals[0]).severity, Severity::Warning);
    }

    #[tokio::test]
    async fn configured_interval_is_used() {
        let gateway = Arc::new(
            ScriptedGateway::new().with_statuses("s1", [JobStatus::Running, JobStatus::Succeeded]),
        );
        let clock = Arc::new(ManualClock::new());
        let reporter = Arc::new(RecordingReporter::default());

        let options = PollOptions::default().with_interval(Duration::from_millis(100));
        coordinator(&gateway, &clock, &reporter)
            .stop("s1", true, &options)
            .await
            .unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
    }

    #[tokio::test]
    async fn unknown_job_fails_without_polling() {
        let gateway = Arc::new(ScriptedGateway::new());
        let clock = Arc::new(ManualClock::new());
        let reporter = Arc::new(RecordingReporter::default());

        let err = coordinator(&gateway, &clock, &reporter)
            .stop("ghost", true, &PollOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::JobNotFound(_)));
        assert_eq!(gateway.calls("stop"), 1);
        assert_eq!(gateway.calls("get_info"), 0);
    }

    #[tokio::test]
    async fn cancelled_wait_keeps_stop_request() {
        let gateway = Arc::new(ScriptedGateway::new().with_statuses("s1", [JobStatus::Running]));
        let clock = Arc::new(ManualClock::new());
        let reporter = Arc::new(RecordingReporter::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = coordinator(&gateway, &clock, &reporter)
            .stop("s1", true, &PollOptions::default().with_cancel(cancel))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Cancelled(_)));
        assert_eq!(gateway.calls("stop"), 1);
        assert!(reporter.finals().is_empty());
    }
}
