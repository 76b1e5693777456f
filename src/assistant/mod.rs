//! Remote assistant service boundary.
//!
//! [`AssistantApi`] is the capability contract the orchestrator consumes;
//! [`OpenAiAssistantClient`] implements it over HTTPS.

mod api;
mod client;
mod retry;
mod types;

pub use api::AssistantApi;
pub use client::OpenAiAssistantClient;
pub use types::{
    Assistant, AssistantSpec, ContentBlock, FunctionCall, ImageFile, ImageUrl, LastError, Message,
    MessageRole, PendingToolCall, RequiredAction, Run, RunStatus, SubmitToolOutputs, TextContent,
    Thread, ToolOutcome,
};
