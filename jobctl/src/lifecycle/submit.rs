//! Submission validation and forwarding.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::interceptor::{Interception, SubmissionInterceptor};
use crate::error::{JobError, Result};
use crate::gateway::JobGateway;
use crate::models::{Deprecation, SubmissionParams, SubmissionRequest, Submitted};

/// Validates submission parameters and forwards a single submit call.
pub struct SubmissionCoordinator {
    gateway: Arc<dyn JobGateway>,
    interceptor: Option<Arc<dyn SubmissionInterceptor>>,
}

impl SubmissionCoordinator {
    pub fn new(gateway: Arc<dyn JobGateway>) -> Self {
        Self {
            gateway,
            interceptor: None,
        }
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn SubmissionInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Validate and submit. Nothing is sent when validation fails; on
    /// success exactly one submission reaches either the interceptor's own
    /// path or the job server.
    #[instrument(skip_all)]
    pub async fn submit(&self, params: &SubmissionParams) -> Result<Submitted> {
        let (request, deprecations) = prepare(params)?;
        for deprecation in &deprecations {
            debug!(%deprecation, "Deprecated submission parameter");
        }

        if let Some(interceptor) = &self.interceptor {
            if let Interception::Handled(submission_id) = interceptor.intercept(&request).await? {
                info!(%submission_id, "Submission handled by hook");
                return Ok(Submitted {
                    submission_id,
                    deprecations,
                });
            }
        }

        let submission_id = self.gateway.submit(&request).await?;
        info!(%submission_id, entrypoint = %request.entrypoint, "Job submitted");
        Ok(Submitted {
            submission_id,
            deprecations,
        })
    }
}

/// Turn raw parameters into a wire request. Performs no network I/O.
pub fn prepare(params: &SubmissionParams) -> Result<(SubmissionRequest, Vec<Deprecation>)> {
    let entrypoint = join_entrypoint(&params.entrypoint);
    if entrypoint.trim().is_empty() {
        return Err(JobError::invalid("Entrypoint command is required"));
    }

    let mut deprecations = Vec::new();
    if let Some(job_id) = &params.job_id {
        deprecations.push(Deprecation::JobIdAlias {
            job_id: job_id.clone(),
        });
    }
    let submission_id = params.submission_id.clone().or_else(|| params.job_id.clone());
    if matches!(&submission_id, Some(id) if id.trim().is_empty()) {
        return Err(JobError::invalid("Submission ID must not be empty"));
    }

    if let Some(cpus) = params.entrypoint_num_cpus {
        check_quantity("entrypoint_num_cpus", cpus)?;
    }
    if let Some(gpus) = params.entrypoint_num_gpus {
        check_quantity("entrypoint_num_gpus", gpus)?;
    }

    let resources = params
        .entrypoint_resources
        .as_deref()
        .map(parse_resources)
        .transpose()?;
    if let Some(resources) = &resources {
        let reserved = [
            ("CPU", "entrypoint_num_cpus", params.entrypoint_num_cpus),
            ("GPU", "entrypoint_num_gpus", params.entrypoint_num_gpus),
        ];
        for (key, option, requested) in reserved {
            if requested.is_some() && resources.contains_key(key) {
                return Err(JobError::invalid(format!(
                    "Resource '{key}' in entrypoint_resources conflicts with {option}"
                )));
            }
        }
    }

    let request = SubmissionRequest {
        entrypoint,
        submission_id,
        runtime_env: resolve_runtime_env(params)?,
        entrypoint_num_cpus: params.entrypoint_num_cpus,
        entrypoint_num_gpus: params.entrypoint_num_gpus,
        entrypoint_resources: resources,
        metadata: params.metadata.clone(),
    };
    Ok((request, deprecations))
}

/// Parse a JSON object mapping resource name to a non-negative quantity.
pub fn parse_resources(text: &str) -> Result<BTreeMap<String, f64>> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        JobError::invalid(format!(
            "entrypoint_resources must be a JSON object mapping resource name to quantity: {e}"
        ))
    })?;

    let Value::Object(map) = value else {
        return Err(JobError::invalid(format!(
            "entrypoint_resources must be a JSON object, got: {text}"
        )));
    };

    map.into_iter()
        .map(|(name, quantity)| {
            let amount = quantity.as_f64().ok_or_else(|| {
                JobError::invalid(format!(
                    "Quantity of resource '{name}' must be a number, got: {quantity}"
                ))
            })?;
            check_quantity(&name, amount)?;
            Ok((name, amount))
        })
        .collect()
}

fn check_quantity(name: &str, amount: f64) -> Result<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(JobError::invalid(format!(
            "Quantity of '{name}' must be a non-negative number, got {amount}"
        )))
    }
}

fn resolve_runtime_env(params: &SubmissionParams) -> Result<Option<Map<String, Value>>> {
    let sources = [
        params.runtime_env.is_some(),
        params.runtime_env_json.is_some(),
        params.runtime_env_file.is_some(),
    ];
    if sources.iter().filter(|given| **given).count() > 1 {
        return Err(JobError::invalid(
            "Only one of runtime_env, runtime_env_json and runtime_env_file may be given",
        ));
    }

    let env = if let Some(env) = &params.runtime_env {
        Some(env.clone())
    } else if let Some(json) = &params.runtime_env_json {
        Some(serde_json::from_str(json).map_err(|e| {
            JobError::invalid(format!("runtime_env_json is not valid JSON: {e}"))
        })?)
    } else if let Some(path) = &params.runtime_env_file {
        let content = std::fs::read_to_string(path).map_err(|e| {
            JobError::invalid(format!("Failed to read {}: {e}", path.display()))
        })?;
        Some(serde_json::from_str(&content).map_err(|e| {
            JobError::invalid(format!("{} is not valid JSON: {e}", path.display()))
        })?)
    } else {
        None
    };

    let mut env = match env {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(JobError::invalid(format!(
                "runtime_env must be a JSON object, got: {other}"
            )));
        }
    };

    if let Some(dir) = &params.working_dir {
        env.get_or_insert_with(Map::new)
            .insert("working_dir".to_string(), Value::String(dir.clone()));
    }
    Ok(env)
}

/// Join an argv into one shell command line.
///
/// A single argument is taken as a complete command line. Otherwise,
/// arguments that are empty or contain whitespace, quotes or backslashes
/// are double-quoted.
pub fn join_entrypoint(argv: &[String]) -> String {
    if let [command] = argv {
        return command.clone();
    }

    argv.iter()
        .map(|arg| {
            let needs_quotes = arg.is_empty()
                || arg
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'));
            if needs_quotes {
                let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
