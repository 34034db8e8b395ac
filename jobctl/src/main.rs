//! jobctl - Submit, watch and stop jobs on a remote job server.
//!
//! Architecture:
//! - The CLI is a thin client over the job server's HTTP API
//! - Waiting, tailing and stop-and-wait live in the `jobctl` library
//! - Exit status: 0 succeeded, 1 stopped or failed, 2 error, 130 interrupted

mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli, Exit};

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            Exit::from_error(&e).into()
        }
    }
}
