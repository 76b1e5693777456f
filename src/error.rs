//! Error types for the orchestrator.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Assistant service error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("Invoke error: {0}")]
    Invoke(#[from] InvokeError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Result type alias for the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;

/// Startup-time configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Tool '{name}' is registered more than once")]
    DuplicateTool { name: String },

    #[error("Tool '{name}' has an invalid parameter schema: {errors}")]
    InvalidToolSchema { name: String, errors: String },
}

/// Errors talking to the remote assistant service.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Assistant service returned {status} for {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Rate limited by assistant service, retry after {0:?}")]
    RateLimited(Option<Duration>),
}

/// Errors that end a run-driver loop without a final answer.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Run {run_id} was cancelled by the caller")]
    Cancelled { run_id: String },

    #[error("Run {run_id} did not finish within {timeout:?}")]
    Timeout { run_id: String, timeout: Duration },

    #[error("Run {run_id} exceeded {limit} tool-call rounds")]
    IterationLimit { run_id: String, limit: u32 },

    #[error(transparent)]
    Assistant(#[from] AssistantError),
}

impl RunError {
    /// Short machine-readable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::Assistant(_) => "assistant",
        }
    }
}

/// Errors invoking a tool directly, outside of any run.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),
}

/// HTTP API startup and runtime failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Failed to bind to {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server stopped unexpectedly: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_kind_labels() {
        let err = RunError::IterationLimit {
            run_id: "run_1".into(),
            limit: 3,
        };
        assert_eq!(err.kind(), "iteration_limit");
        assert!(err.to_string().contains("3 tool-call rounds"));
    }
}
