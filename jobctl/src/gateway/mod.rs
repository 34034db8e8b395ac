//! Access to the remote job server.
//!
//! [`JobGateway`] is the only seam that touches the network. Retry and
//! backoff for transient failures live behind it; lifecycle code treats
//! every gateway error as final for the call that produced it.

mod http;
#[cfg(test)]
pub mod mock;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::Result;
use crate::models::{JobInfo, JobStatus, SubmissionId, SubmissionRequest};

pub use http::HttpGateway;

/// Lowest protocol version that supports incremental log streaming.
pub const MIN_STREAMING_PROTOCOL: u32 = 1;

/// Incremental log output, in server emission order. Ends once the job is
/// terminal; cannot be restarted from an offset.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait JobGateway: Send + Sync {
    /// Address of the job server, for display.
    fn address(&self) -> &str;

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionId>;

    async fn get_info(&self, submission_id: &str) -> Result<JobInfo>;

    async fn get_status(&self, submission_id: &str) -> Result<JobStatus> {
        Ok(self.get_info(submission_id).await?.status)
    }

    /// Request a stop. Returns whether the server had a running job to stop.
    async fn stop(&self, submission_id: &str) -> Result<bool>;

    /// All log text buffered at call time.
    async fn fetch_logs(&self, submission_id: &str) -> Result<String>;

    async fn stream_logs(&self, submission_id: &str) -> Result<LogStream>;

    async fn list_jobs(&self) -> Result<Vec<JobInfo>>;

    async fn protocol_version(&self) -> Result<u32>;
}
