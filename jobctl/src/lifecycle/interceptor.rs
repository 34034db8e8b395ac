//! Pluggable pre-submission hooks.
//!
//! An interceptor sees the validated request before the default submission
//! path. It either lets the submission continue or takes it over and
//! returns the submission ID itself, in which case the job server is not
//! contacted.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{JobError, Result};
use crate::models::{SubmissionId, SubmissionRequest};

/// Decision returned by an interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Proceed with the default submission.
    Continue,
    /// The hook submitted the job itself.
    Handled(SubmissionId),
}

#[async_trait]
pub trait SubmissionInterceptor: Send + Sync {
    async fn intercept(&self, request: &SubmissionRequest) -> Result<Interception>;
}

/// Runs an external command with the request as JSON on stdin.
///
/// A non-zero exit rejects the submission. If the command prints a line on
/// stdout, the first non-empty line is taken as the submission ID and the
/// submission counts as handled.
#[derive(Debug, Clone)]
pub struct CommandInterceptor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandInterceptor {
    pub fn new(command: &[String], timeout: Duration) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| JobError::invalid("Submit hook command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    /// The hook named by the configuration, if any.
    pub fn from_config(config: &ClientConfig) -> Result<Option<Self>> {
        config
            .submit_hook
            .as_deref()
            .map(|command| Self::new(command, config.submit_hook_timeout()))
            .transpose()
    }
}

#[async_trait]
impl SubmissionInterceptor for CommandInterceptor {
    async fn intercept(&self, request: &SubmissionRequest) -> Result<Interception> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| JobError::Interceptor(format!("Failed to encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::Interceptor(format!("Failed to spawn {}: {e}", self.program)))?;

        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut stdin) = stdin {
                // The hook may exit without reading its input.
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "Submit hook did not read the request");
                }
            }
            child.wait_with_output().await
        };

        // Dropping `run` on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                JobError::Interceptor(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| JobError::Interceptor(format!("Failed to wait for {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JobError::Interceptor(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map_or(Interception::Continue, |id| {
                Interception::Handled(id.to_string())
            }))
    }
}
