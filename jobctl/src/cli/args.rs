//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// jobctl - Submit, watch and stop jobs on a remote job server
#[derive(Parser, Debug)]
#[command(name = "jobctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address of the job server (e.g. http://127.0.0.1:8265)
    #[arg(long, global = true)]
    pub address: Option<String>,

    /// Config file to read instead of ~/.jobctl/config.json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Seconds between status requests while waiting
    #[arg(long, global = true)]
    pub poll_interval: Option<f64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a job and follow its logs
    Submit(SubmitArgs),

    /// Show the current status of a job
    Status {
        /// Submission ID of the job
        submission_id: String,
    },

    /// Stop a job
    Stop {
        /// Submission ID of the job
        submission_id: String,

        /// Return as soon as the stop request is sent
        #[arg(long)]
        no_wait: bool,
    },

    /// Print the logs of a job
    Logs {
        /// Submission ID of the job
        submission_id: String,

        /// Keep printing new output until the job exits
        #[arg(short, long)]
        follow: bool,
    },

    /// List all jobs known to the server
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ListFormat,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct SubmitArgs {
    /// Submission ID to use instead of a generated one
    #[arg(long)]
    pub submission_id: Option<String>,

    /// Deprecated alias for --submission-id
    #[arg(long, hide = true)]
    pub job_id: Option<String>,

    /// Path to a JSON file with the runtime environment
    #[arg(long, conflicts_with = "runtime_env_json")]
    pub runtime_env: Option<PathBuf>,

    /// Runtime environment as inline JSON
    #[arg(long)]
    pub runtime_env_json: Option<String>,

    /// Working directory of the job, overriding the runtime environment
    #[arg(long)]
    pub working_dir: Option<String>,

    /// CPUs to reserve for the entrypoint
    #[arg(long)]
    pub entrypoint_num_cpus: Option<f64>,

    /// GPUs to reserve for the entrypoint
    #[arg(long)]
    pub entrypoint_num_gpus: Option<f64>,

    /// Custom resources for the entrypoint as a JSON object
    #[arg(long)]
    pub entrypoint_resources: Option<String>,

    /// Metadata to attach to the job (repeatable)
    #[arg(long = "metadata", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Do not follow the job's logs after submitting
    #[arg(long)]
    pub no_wait: bool,

    /// Entrypoint command, given after `--`
    #[arg(trailing_var_arg = true, required = true)]
    pub entrypoint: Vec<String>,
}

/// Output formats for `list`
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ListFormat {
    /// One row per job
    #[default]
    Table,
    /// Full job details as JSON
    Json,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}
