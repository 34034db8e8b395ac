//! Submission inputs and the normalized request sent to the job server.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque identifier of a job, caller-supplied or assigned by the server.
pub type SubmissionId = String;

/// A validated submission, exactly as it goes over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Shell command line the job runs.
    pub entrypoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<SubmissionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_env: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint_num_cpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint_num_gpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint_resources: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Raw submission parameters as a caller collects them.
///
/// Nothing here has been validated yet; see
/// [`SubmissionCoordinator`](crate::lifecycle::SubmissionCoordinator).
#[derive(Debug, Clone, Default)]
pub struct SubmissionParams {
    /// Entrypoint argv, joined into one command line on submission.
    pub entrypoint: Vec<String>,
    pub submission_id: Option<String>,
    /// Deprecated alias for `submission_id`.
    pub job_id: Option<String>,
    /// Runtime environment given as a structured value.
    pub runtime_env: Option<Value>,
    /// Runtime environment given as inline JSON text.
    pub runtime_env_json: Option<String>,
    /// Runtime environment read from a JSON file.
    pub runtime_env_file: Option<PathBuf>,
    /// Overrides `working_dir` inside the runtime environment.
    pub working_dir: Option<String>,
    pub entrypoint_num_cpus: Option<f64>,
    pub entrypoint_num_gpus: Option<f64>,
    /// JSON object text mapping resource name to quantity.
    pub entrypoint_resources: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl SubmissionParams {
    /// Start from an entrypoint argv.
    pub fn new<I, S>(entrypoint: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entrypoint: entrypoint.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn submission_id(mut self, id: impl Into<String>) -> Self {
        self.submission_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn runtime_env(mut self, env: Value) -> Self {
        self.runtime_env = Some(env);
        self
    }

    #[must_use]
    pub fn runtime_env_json(mut self, json: impl Into<String>) -> Self {
        self.runtime_env_json = Some(json.into());
        self
    }

    #[must_use]
    pub fn runtime_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_env_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn num_cpus(mut self, cpus: f64) -> Self {
        self.entrypoint_num_cpus = Some(cpus);
        self
    }

    #[must_use]
    pub const fn num_gpus(mut self, gpus: f64) -> Self {
        self.entrypoint_num_gpus = Some(gpus);
        self
    }

    #[must_use]
    pub fn resources(mut self, json: impl Into<String>) -> Self {
        self.entrypoint_resources = Some(json.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Non-fatal notices raised while preparing a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deprecation {
    /// The legacy job ID parameter was used.
    JobIdAlias { job_id: String },
}

impl std::fmt::Display for Deprecation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JobIdAlias { .. } => {
                write!(f, "--job-id option is deprecated. Please use --submission-id instead.")
            }
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub submission_id: SubmissionId,
    pub deprecations: Vec<Deprecation>,
}
