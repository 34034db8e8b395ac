//! Data models for jobs and submissions.

mod job;
mod submission;

pub use job::{JobInfo, JobOutcome, JobStatus};
pub use submission::{Deprecation, SubmissionId, SubmissionParams, SubmissionRequest, Submitted};
