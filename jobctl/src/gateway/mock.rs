//! Scripted in-memory gateway for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_stream::StreamExt;

use super::{JobGateway, LogStream, MIN_STREAMING_PROTOCOL};
use crate::error::{JobError, Result};
use crate::models::{JobInfo, JobStatus, SubmissionId, SubmissionRequest};

/// Replays scripted statuses and log chunks, counting every call.
///
/// Each `get_info` pops the next scripted info for the job; the last one
/// repeats once the script runs out.
pub struct ScriptedGateway {
    version: u32,
    infos: Mutex<HashMap<String, VecDeque<JobInfo>>>,
    last: Mutex<HashMap<String, JobInfo>>,
    chunks: HashMap<String, Vec<String>>,
    stream_errors: HashMap<String, String>,
    endless: HashSet<String>,
    submitted: Mutex<Vec<SubmissionRequest>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    log: Mutex<Vec<&'static str>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            version: MIN_STREAMING_PROTOCOL,
            infos: Mutex::new(HashMap::new()),
            last: Mutex::new(HashMap::new()),
            chunks: HashMap::new(),
            stream_errors: HashMap::new(),
            endless: HashSet::new(),
            submitted: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Script the statuses `get_info` reports for a job.
    pub fn with_statuses<I>(self, id: &str, statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        self.with_infos(id, statuses.into_iter().map(|s| JobInfo::new(id, s)))
    }

    pub fn with_infos<I>(self, id: &str, infos: I) -> Self
    where
        I: IntoIterator<Item = JobInfo>,
    {
        if let Ok(mut map) = self.infos.lock() {
            map.entry(id.to_string()).or_default().extend(infos);
        }
        self
    }

    pub fn with_chunks<I, S>(mut self, id: &str, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks
            .insert(id.to_string(), chunks.into_iter().map(Into::into).collect());
        self
    }

    /// End the job's log stream with a transport error after its chunks.
    pub fn with_stream_error(mut self, id: &str, message: &str) -> Self {
        self.stream_errors.insert(id.to_string(), message.to_string());
        self
    }

    /// Keep the job's log stream open forever after its chunks.
    pub fn with_endless_stream(mut self, id: &str) -> Self {
        self.endless.insert(id.to_string());
        self
    }

    /// Number of times `op` was called.
    pub fn calls(&self, op: &str) -> usize {
        self.calls
            .lock()
            .ok()
            .and_then(|calls| calls.get(op).copied())
            .unwrap_or(0)
    }

    /// Total calls across every operation.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    /// Every call in the order it was made.
    pub fn call_log(&self) -> Vec<&'static str> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<SubmissionRequest> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, op: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(op).or_default() += 1;
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(op);
        }
    }

    fn is_known(&self, id: &str) -> bool {
        let scripted = self.infos.lock().is_ok_and(|m| m.contains_key(id));
        scripted || self.chunks.contains_key(id)
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobGateway for ScriptedGateway {
    fn address(&self) -> &str {
        "scripted://"
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionId> {
        self.record("submit");
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(request.clone());
        }
        Ok(request
            .submission_id
            .clone()
            .unwrap_or_else(|| "raysubmit_scripted".to_string()))
    }

    async fn get_info(&self, submission_id: &str) -> Result<JobInfo> {
        self.record("get_info");
        let mut infos = self
            .infos
            .lock()
            .map_err(|_| JobError::ServerUnavailable("poisoned".into()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| JobError::ServerUnavailable("poisoned".into()))?;

        let queue = infos
            .get_mut(submission_id)
            .ok_or_else(|| JobError::JobNotFound(submission_id.to_string()))?;

        if let Some(info) = queue.pop_front() {
            last.insert(submission_id.to_string(), info);
        }
        last.get(submission_id)
            .cloned()
            .ok_or_else(|| JobError::JobNotFound(submission_id.to_string()))
    }

    async fn stop(&self, submission_id: &str) -> Result<bool> {
        self.record("stop");
        if self.is_known(submission_id) {
            Ok(true)
        } else {
            Err(JobError::JobNotFound(submission_id.to_string()))
        }
    }

    async fn fetch_logs(&self, submission_id: &str) -> Result<String> {
        self.record("fetch_logs");
        if !self.is_known(submission_id) {
            return Err(JobError::JobNotFound(submission_id.to_string()));
        }
        Ok(self
            .chunks
            .get(submission_id)
            .map(|chunks| chunks.concat())
            .unwrap_or_default())
    }

    async fn stream_logs(&self, submission_id: &str) -> Result<LogStream> {
        self.record("stream_logs");
        if self.version < MIN_STREAMING_PROTOCOL {
            return Err(JobError::UnsupportedProtocol {
                required: MIN_STREAMING_PROTOCOL,
                actual: self.version,
            });
        }

        let mut items: Vec<Result<String>> = self
            .chunks
            .get(submission_id)
            .into_iter()
            .flatten()
            .cloned()
            .map(Ok)
            .collect();
        if let Some(message) = self.stream_errors.get(submission_id) {
            items.push(Err(JobError::ServerUnavailable(message.clone())));
        }

        let stream = tokio_stream::iter(items);
        if self.endless.contains(submission_id) {
            Ok(Box::pin(stream.chain(tokio_stream::pending())))
        } else {
            Ok(Box::pin(stream))
        }
    }

    async fn list_jobs(&self) -> Result<Vec<JobInfo>> {
        self.record("list_jobs");
        let infos = self
            .infos
            .lock()
            .map_err(|_| JobError::ServerUnavailable("poisoned".into()))?;
        let last = self
            .last
            .lock()
            .map_err(|_| JobError::ServerUnavailable("poisoned".into()))?;

        let mut jobs: Vec<JobInfo> = infos
            .iter()
            .filter_map(|(id, queue)| last.get(id).or_else(|| queue.front()).cloned())
            .collect();
        jobs.sort_by(|a, b| a.submission_id.cmp(&b.submission_id));
        Ok(jobs)
    }

    async fn protocol_version(&self) -> Result<u32> {
        self.record("protocol_version");
        Ok(self.version)
    }
}
