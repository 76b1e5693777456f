//! Onchain Agent: a tool-calling orchestrator for hosted assistant runs.
//!
//! A remote assistant run may pause and ask for named tools to be executed.
//! The [`agent::RunDriver`] resolves those pauses through the
//! [`tools::ToolDispatcher`], submits the outputs and repeats until the run
//! finishes, narrating every step to the [`status::StatusReporter`].

pub mod agent;
pub mod assistant;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod status;
pub mod testing;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};
