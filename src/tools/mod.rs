//! Tool system.
//!
//! A [`Tool`] is a named capability the assistant may request. Tools are
//! collected once into an immutable [`ToolRegistry`]; the
//! [`ToolDispatcher`] resolves a batch of requested calls against it and
//! runs them concurrently.

pub mod builtin;
pub mod redaction;

mod dispatcher;
mod registry;
mod tool;

pub use dispatcher::{ToolDispatcher, execute_tool};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use tool::{
    Tool, ToolError, ToolOutput, ToolSchema, check_arguments, parse_arguments, parse_params,
    require_str, stringify_result, validate_tool_schema,
};
