//! CLI command execution.
//!
//! Every command builds a `JobClient` from the resolved configuration and
//! maps the result onto a process exit status.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use jobctl::config::ClientConfig;
use jobctl::lifecycle::{ConsoleReporter, LogsOutcome, StopOutcome};
use jobctl::models::{JobInfo, JobOutcome, SubmissionParams};
use jobctl::shutdown::install_interrupt_handler;
use jobctl::{JobClient, JobError};
use tokio_util::sync::CancellationToken;

use super::args::{Cli, Commands, ListFormat, SubmitArgs};

/// Process exit status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The job succeeded, or the command has no job outcome.
    Success,
    /// The job ended STOPPED or FAILED.
    JobUnsuccessful,
    /// The command itself failed.
    Error,
    /// The user interrupted a wait.
    Interrupted,
}

impl Exit {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::JobUnsuccessful => 1,
            Self::Error => 2,
            Self::Interrupted => 130,
        }
    }

    pub const fn from_outcome(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded | JobOutcome::InProgress(_) => Self::Success,
            JobOutcome::Stopped | JobOutcome::Failed => Self::JobUnsuccessful,
        }
    }

    pub fn from_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<JobError>() {
            Some(JobError::Cancelled(_)) => Self::Interrupted,
            _ => Self::Error,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        Self::from(exit.code())
    }
}

// === Configuration ===

fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config =
        ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(address) = &cli.address {
        config.address.clone_from(address);
    }
    if let Some(secs) = cli.poll_interval {
        let interval = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid poll interval: {secs}"))?;
        config.poll_interval_ms =
            u64::try_from(interval.as_millis()).context("Poll interval is too large")?;
    }

    config.validate()?;
    Ok(config)
}

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<Exit> {
    let config = resolve_config(&cli)?;
    let client = JobClient::from_config(&config, Arc::new(ConsoleReporter::new()))
        .context("Failed to create job client")?;
    let cancel = install_interrupt_handler().context("Failed to install signal handlers")?;

    match cli.command {
        Commands::Submit(args) => submit(&client, args, &cancel).await,
        Commands::Status { submission_id } => status(&client, &submission_id).await,
        Commands::Stop {
            submission_id,
            no_wait,
        } => stop(&client, &submission_id, !no_wait, &cancel).await,
        Commands::Logs {
            submission_id,
            follow,
        } => logs(&client, &submission_id, follow, &cancel).await,
        Commands::List { format } => list(&client, format).await,
    }
}

fn print_chunk(chunk: &str) {
    print!("{chunk}");
    // A closed stdout only loses log text.
    let _ = std::io::stdout().flush();
}

fn submission_params(args: SubmitArgs) -> SubmissionParams {
    SubmissionParams {
        entrypoint: args.entrypoint,
        submission_id: args.submission_id,
        job_id: args.job_id,
        runtime_env: None,
        runtime_env_json: args.runtime_env_json,
        runtime_env_file: args.runtime_env,
        working_dir: args.working_dir,
        entrypoint_num_cpus: args.entrypoint_num_cpus,
        entrypoint_num_gpus: args.entrypoint_num_gpus,
        entrypoint_resources: args.entrypoint_resources,
        metadata: args.metadata.into_iter().collect(),
    }
}

async fn submit(client: &JobClient, args: SubmitArgs, cancel: &CancellationToken) -> Result<Exit> {
    let no_wait = args.no_wait;
    println!("Job submission server address: {}", client.address());
    let submitted = client
        .submit_job(&submission_params(args))
        .await
        .context("Failed to submit job")?;
    let id = &submitted.submission_id;

    let headline = format!("Job '{id}' submitted successfully");
    println!("{}", "-".repeat(headline.len()));
    println!("{headline}");
    println!("{}", "-".repeat(headline.len()));
    println!();
    println!("Next steps");
    println!("  Query the logs of the job:");
    println!("    jobctl logs {id}");
    println!("  Query the status of the job:");
    println!("    jobctl status {id}");
    println!("  Request the job to be stopped:");
    println!("    jobctl stop {id}");
    println!();

    if no_wait {
        return Ok(Exit::Success);
    }

    let version = client.protocol_version().await?;
    if version < jobctl::gateway::MIN_STREAMING_PROTOCOL {
        eprintln!(
            "Warning: Tailing logs is not enabled for job server protocol version {version}. \
             Use 'jobctl logs {id}' to fetch the logs."
        );
        return Ok(Exit::Success);
    }

    println!("Tailing logs until the job exits (disable with --no-wait):");
    let info = client
        .tail_job_logs(id, &mut print_chunk, cancel)
        .await
        .with_context(|| format!("Lost the log stream of job '{id}'"))?;
    Ok(Exit::from_outcome(info.outcome()))
}

async fn status(client: &JobClient, submission_id: &str) -> Result<Exit> {
    let info = client
        .get_job_status(submission_id)
        .await
        .with_context(|| format!("Failed to get status of job '{submission_id}'"))?;
    Ok(Exit::from_outcome(info.outcome()))
}

async fn stop(
    client: &JobClient,
    submission_id: &str,
    wait: bool,
    cancel: &CancellationToken,
) -> Result<Exit> {
    println!("Attempting to stop job '{submission_id}'");
    let outcome = client
        .stop_job(submission_id, wait, &client.poll_options(cancel))
        .await
        .with_context(|| format!("Failed to stop job '{submission_id}'"))?;

    match outcome {
        StopOutcome::Requested { stopped: true } => {
            println!("Requested job '{submission_id}' to stop");
            Ok(Exit::Success)
        }
        StopOutcome::Requested { stopped: false } => {
            println!("Job '{submission_id}' has already exited");
            Ok(Exit::Success)
        }
        StopOutcome::Finished(info) => Ok(Exit::from_outcome(info.outcome())),
    }
}

async fn logs(
    client: &JobClient,
    submission_id: &str,
    follow: bool,
    cancel: &CancellationToken,
) -> Result<Exit> {
    if !follow {
        let logs = client
            .get_job_logs_snapshot(submission_id)
            .await
            .with_context(|| format!("Failed to fetch logs of job '{submission_id}'"))?;
        print_chunk(&logs);
        return Ok(Exit::Success);
    }

    let outcome = client
        .follow_logs(submission_id, &mut print_chunk, cancel)
        .await
        .with_context(|| format!("Failed to follow logs of job '{submission_id}'"))?;
    Ok(match outcome {
        LogsOutcome::Followed(info) => Exit::from_outcome(info.outcome()),
        LogsOutcome::Snapshot => Exit::Success,
    })
}

async fn list(client: &JobClient, format: ListFormat) -> Result<Exit> {
    let jobs = client.list_jobs().await.context("Failed to list jobs")?;

    match format {
        ListFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        ListFormat::Table => {
            if jobs.is_empty() {
                println!("No jobs found.");
                return Ok(Exit::Success);
            }
            println!(
                "{:<28} {:<10} {:<20} {}",
                "SUBMISSION ID", "STATUS", "START TIME", "ENTRYPOINT"
            );
            println!("{}", "-".repeat(90));
            for job in &jobs {
                println!("{}", table_row(job));
            }
        }
    }
    Ok(Exit::Success)
}

fn table_row(job: &JobInfo) -> String {
    let started = job.start_time.map_or_else(
        || "-".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let entrypoint = job.entrypoint.as_deref().unwrap_or("-");
    let entrypoint_short: String = if entrypoint.chars().count() > 40 {
        format!("{}...", entrypoint.chars().take(37).collect::<String>())
    } else {
        entrypoint.to_string()
    };
    format!(
        "{:<28} {:<10} {:<20} {}",
        job.submission_id,
        job.status.as_str(),
        started,
        entrypoint_short
    )
}
