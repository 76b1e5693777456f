//! Configuration for the orchestrator.
//!
//! Values come from the process environment, after an optional `.env` file
//! has been loaded by the binary. Only `OPENAI_API_KEY` is required.

mod assistant;
pub(crate) mod helpers;
mod http;
mod run;
mod tools;

pub use assistant::{AssistantConfig, DEFAULT_INSTRUCTIONS};
pub use http::HttpConfig;
pub use run::RunConfig;
pub use tools::ToolsConfig;

use crate::error::ConfigError;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub assistant: AssistantConfig,
    pub run: RunConfig,
    pub http: HttpConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            assistant: AssistantConfig::resolve()?,
            run: RunConfig::resolve()?,
            http: HttpConfig::resolve()?,
            tools: ToolsConfig::resolve()?,
        })
    }
}
