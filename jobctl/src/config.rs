//! Client configuration.
//!
//! Resolution order: command-line flags, then the config file
//! (`--config <path>` or `~/.jobctl/config.json`), then defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};

const CONFIG_DIR: &str = ".jobctl";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8265";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the job server.
    pub address: String,
    /// Delay between status polls while waiting for a job.
    pub poll_interval_ms: u64,
    /// Timeout for a single non-streaming request.
    pub request_timeout_secs: u64,
    /// Retries for transient gateway failures.
    pub max_retries: u32,
    /// First retry delay; doubles on every attempt.
    pub retry_backoff_ms: u64,
    /// Optional command run before every submission (program, then args).
    pub submit_hook: Option<Vec<String>>,
    pub submit_hook_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            poll_interval_ms: 1000,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 200,
            submit_hook: None,
            submit_hook_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Load from an explicit path, or from the default location if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            JobError::invalid(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            JobError::invalid(format!("Failed to parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.address.starts_with("http://") || self.address.starts_with("https://")) {
            return Err(JobError::invalid(format!(
                "Job server address must be an http(s) URL, got '{}'",
                self.address
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(JobError::invalid("Poll interval must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(JobError::invalid("Request timeout must be positive"));
        }
        if matches!(&self.submit_hook, Some(cmd) if cmd.is_empty()) {
            return Err(JobError::invalid("Submit hook command is empty"));
        }
        Ok(())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub const fn submit_hook_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_hook_timeout_secs)
    }
}

/// `~/.jobctl/config.json`, if a home directory exists.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"address": "http://jobs.internal:8265", "max_retries": 0}}"#
        )
        .unwrap();

        let config = ClientConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.address, "http://jobs.internal:8265");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn rejects_bad_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"address": "jobs.internal:8265"}}"#).unwrap();

        let err = ClientConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, JobError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_zero_interval_and_empty_hook() {
        let config = ClientConfig {
            poll_interval_ms: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            submit_hook: Some(Vec::new()),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_request_timeout() {
        let config = ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, JobError::InvalidArgument(_)));
        assert!(err.to_string().contains("Request timeout"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
