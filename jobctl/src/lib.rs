//! Client-side job lifecycle management for a remote job server.
//!
//! Submit jobs, poll them to completion, tail their logs and stop them.
//! All network access goes through a [`gateway::JobGateway`]; the
//! [`lifecycle`] module layers waiting, reporting and cancellation on top.

pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod models;
pub mod shutdown;

pub use error::{JobError, Result};
pub use lifecycle::JobClient;
