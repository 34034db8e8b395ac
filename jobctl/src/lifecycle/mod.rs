//! Job lifecycle operations over a [`JobGateway`](crate::gateway::JobGateway).

mod client;
mod interceptor;
mod poller;
pub mod report;
mod stop;
mod submit;
mod tailer;

pub use client::{JobClient, LogsOutcome, TailHandle};
pub use interceptor::{CommandInterceptor, Interception, SubmissionInterceptor};
pub use poller::{PollOptions, StatusPoller};
pub use report::{ConsoleReporter, NoopReporter, Reporter};
pub use stop::{StopCoordinator, StopOutcome};
pub use submit::{join_entrypoint, parse_resources, prepare, SubmissionCoordinator};
pub use tailer::{LogSink, LogTailer};
