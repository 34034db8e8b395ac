//! Job status model and the information the server reports about a job.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a job as reported by the job server.
///
/// `Stopped`, `Succeeded` and `Failed` are terminal: once the server reports
/// one of them for a submission it never reports anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job is accepted but the entrypoint has not started.
    Pending,
    /// Entrypoint is running.
    Running,
    /// Job was stopped on request.
    Stopped,
    /// Entrypoint exited successfully.
    Succeeded,
    /// Entrypoint failed or the job could not be started.
    Failed,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Running,
        Self::Stopped,
        Self::Succeeded,
        Self::Failed,
    ];

    /// Wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether no further transition can happen.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Succeeded | Self::Failed)
    }

    /// Classify this status under the succeeded / stopped / failed rule.
    pub const fn outcome(self) -> JobOutcome {
        match self {
            Self::Succeeded => JobOutcome::Succeeded,
            Self::Stopped => JobOutcome::Stopped,
            Self::Failed => JobOutcome::Failed,
            Self::Pending | Self::Running => JobOutcome::InProgress(self),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three-way reporting branch shared by every consumer of a final status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Terminal success.
    Succeeded,
    /// Terminal, stopped on request. Reported as a warning.
    Stopped,
    /// Terminal failure. Reported with the server message when present.
    Failed,
    /// Not terminal yet.
    InProgress(JobStatus),
}

impl JobOutcome {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress(_))
    }
}

/// Information about a single job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Submission ID the job is addressed by.
    pub submission_id: String,
    /// Current status.
    pub status: JobStatus,
    /// Human-readable explanation, always set on failure.
    #[serde(default)]
    pub message: Option<String>,
    /// Legacy driver job ID, when the server assigned one.
    #[serde(default)]
    pub job_id: Option<String>,
    /// Command line the job runs.
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// When the job started.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    /// Free-form metadata attached at submission time.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl JobInfo {
    /// Create info with only the required fields set.
    pub fn new(submission_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            submission_id: submission_id.into(),
            status,
            message: None,
            job_id: None,
            entrypoint: None,
            start_time: None,
            end_time: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach a status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub const fn outcome(&self) -> JobOutcome {
        self.status.outcome()
    }
}
