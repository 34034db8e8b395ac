//! Command-line interface.

mod args;
mod commands;

pub use args::Cli;
pub use commands::{execute, Exit};
