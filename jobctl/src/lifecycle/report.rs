//! Reporting of progress and final job status.
//!
//! Every consumer of a final status (status command, stop-and-wait, tail
//! completion) goes through [`Reporter::final_status`], so the
//! succeeded / stopped / failed rule is applied in exactly one place.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{JobInfo, JobOutcome, JobStatus};

/// Sink for lifecycle notifications.
pub trait Reporter: Send + Sync {
    /// A non-terminal status observed while waiting.
    fn progress(&self, info: &JobInfo);

    /// The status a finished operation ends on.
    fn final_status(&self, info: &JobInfo);

    /// A non-fatal notice (deprecations, capability fallbacks).
    fn notice(&self, _message: &str) {}
}

/// How prominently a report is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}

/// A rendered report, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,
    pub lines: Vec<String>,
}

fn banner(message: &str) -> Vec<String> {
    let rule = "-".repeat(message.chars().count());
    vec![rule.clone(), message.to_string(), rule]
}

/// Render the final status of a job under the three-way rule.
pub fn render_final(info: &JobInfo) -> Report {
    let id = &info.submission_id;
    let status_message = info
        .message
        .as_ref()
        .map(|message| format!("Status message: {message}"));

    match info.outcome() {
        JobOutcome::Succeeded => Report {
            severity: Severity::Success,
            lines: banner(&format!("Job '{id}' succeeded")),
        },
        JobOutcome::Stopped => Report {
            severity: Severity::Warning,
            lines: vec![format!("Job '{id}' was stopped")],
        },
        JobOutcome::Failed => {
            let mut lines = banner(&format!("Job '{id}' failed"));
            lines.extend(status_message);
            Report {
                severity: Severity::Error,
                lines,
            }
        }
        JobOutcome::InProgress(status) => {
            let mut lines = vec![format!("Status for job '{id}': {status}")];
            lines.extend(status_message);
            Report {
                severity: Severity::Info,
                lines,
            }
        }
    }
}

/// Prints reports to the terminal.
///
/// Progress is printed only when a job's status differs from the last one
/// printed for it, so fast polling does not flood the terminal.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    last_progress: Mutex<HashMap<String, JobStatus>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `info` as printed; false if it repeats the last printed status.
    fn status_changed(&self, info: &JobInfo) -> bool {
        let Ok(mut last) = self.last_progress.lock() else {
            return true;
        };
        last.insert(info.submission_id.clone(), info.status) != Some(info.status)
    }
}

impl Reporter for ConsoleReporter {
    fn progress(&self, info: &JobInfo) {
        if self.status_changed(info) {
            println!("Job has not exited yet. Status: {}", info.status);
        }
    }

    fn final_status(&self, info: &JobInfo) {
        let report = render_final(info);
        match report.severity {
            Severity::Success | Severity::Info => {
                println!();
                for line in &report.lines {
                    println!("{line}");
                }
                println!();
            }
            Severity::Warning => {
                for line in &report.lines {
                    eprintln!("Warning: {line}");
                }
            }
            Severity::Error => {
                eprintln!();
                for line in &report.lines {
                    eprintln!("{line}");
                }
                eprintln!();
            }
        }
    }

    fn notice(&self, message: &str) {
        eprintln!("Warning: {message}");
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn progress(&self, _info: &JobInfo) {}

    fn final_status(&self, _info: &JobInfo) {}
}
