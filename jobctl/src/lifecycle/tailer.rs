//! Incremental log tailing.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::report::Reporter;
use crate::error::{JobError, Result};
use crate::gateway::{JobGateway, MIN_STREAMING_PROTOCOL};
use crate::models::JobInfo;

/// Receives log chunks in the order the server emitted them.
pub trait LogSink: Send {
    fn write_chunk(&mut self, chunk: &str);
}

impl<F> LogSink for F
where
    F: FnMut(&str) + Send,
{
    fn write_chunk(&mut self, chunk: &str) {
        self(chunk);
    }
}

/// Forwards a job's log stream to a sink, then reports the final status.
pub struct LogTailer {
    gateway: Arc<dyn JobGateway>,
    reporter: Arc<dyn Reporter>,
}

impl LogTailer {
    pub fn new(gateway: Arc<dyn JobGateway>, reporter: Arc<dyn Reporter>) -> Self {
        Self { gateway, reporter }
    }

    /// Tail logs until the server closes the stream.
    ///
    /// Fails with `UnsupportedProtocol` before opening a stream when the
    /// server cannot stream; callers fall back to a snapshot fetch. Once the
    /// stream ends, cleanly or not, the final status is fetched and
    /// reported. A stream that ends without the job being terminal, or that
    /// breaks mid-way, yields `StreamInterrupted`; re-tailing starts from
    /// the current end of the log.
    #[instrument(skip(self, sink, cancel))]
    pub async fn stream_to<S>(
        &self,
        submission_id: &str,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<JobInfo>
    where
        S: LogSink + ?Sized,
    {
        let version = self.gateway.protocol_version().await?;
        if version < MIN_STREAMING_PROTOCOL {
            return Err(JobError::UnsupportedProtocol {
                required: MIN_STREAMING_PROTOCOL,
                actual: version,
            });
        }

        let mut stream = self.gateway.stream_logs(submission_id).await?;
        let mut chunks: usize = 0;

        let broken = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(JobError::Cancelled(format!(
                        "tailing logs of job '{submission_id}'"
                    )));
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    chunks += 1;
                    sink.write_chunk(&chunk);
                }
                Some(Err(e)) => break Some(e),
                None => break None,
            }
        };
        drop(stream);
        debug!(chunks, "Log stream closed");

        let info = match (self.gateway.get_info(submission_id).await, &broken) {
            (Ok(info), _) => info,
            (Err(e), None) => return Err(e),
            (Err(_), Some(_)) => {
                return Err(JobError::StreamInterrupted {
                    submission_id: submission_id.to_string(),
                    last_status: None,
                });
            }
        };
        self.reporter.final_status(&info);

        if let Some(e) = broken {
            warn!(error = %e, status = %info.status, "Log stream broke");
        } else if info.is_terminal() {
            return Ok(info);
        }

        Err(JobError::StreamInterrupted {
            submission_id: submission_id.to_string(),
            last_status: Some(info.status),
        })
    }
}
