//! Error taxonomy for job lifecycle operations.

use std::time::Duration;

use thiserror::Error;

use crate::models::JobStatus;

#[derive(Error, Debug)]
pub enum JobError {
    /// Rejected locally before any request was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Server protocol version {actual} does not support this (requires {required})")]
    UnsupportedProtocol { required: u32, actual: u32 },

    #[error("Job server unavailable: {0}")]
    ServerUnavailable(String),

    #[error(
        "Log stream for job '{submission_id}' ended before the job finished (last status: {})",
        status_label(.last_status)
    )]
    StreamInterrupted {
        submission_id: String,
        last_status: Option<JobStatus>,
    },

    #[error("Gave up waiting for job '{submission_id}' after {waited:?}")]
    DeadlineExceeded {
        submission_id: String,
        waited: Duration,
    },

    #[error("Cancelled while {0}")]
    Cancelled(String),

    #[error("HTTP error with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed server response: {0}")]
    Decode(String),

    #[error("Submission hook failed: {0}")]
    Interceptor(String),
}

pub type Result<T> = std::result::Result<T, JobError>;

fn status_label(status: &Option<JobStatus>) -> &'static str {
    status.map_or("unknown", JobStatus::as_str)
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::ServerUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl JobError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Conditions the caller may retry by re-invoking the operation.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StreamInterrupted { .. } | Self::ServerUnavailable(_) | Self::Cancelled(_)
        )
    }

    /// A capability mismatch; callers fall back to a lesser feature.
    pub const fn is_capability_signal(&self) -> bool {
        matches!(self, Self::UnsupportedProtocol { .. })
    }
}
