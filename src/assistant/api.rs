use async_trait::async_trait;

use crate::assistant::types::{
    Assistant, AssistantSpec, Message, MessageRole, Run, Thread, ToolOutcome,
};
use crate::error::AssistantError;

/// Operations consumed from the remote assistant service.
///
/// The run driver only needs the run and message operations; the thread and
/// assistant operations back the chat service.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Fetch the current state of a run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    /// Report tool outputs for a run that requires action.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutcome],
    ) -> Result<Run, AssistantError>;

    /// Messages on a thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, AssistantError>;

    /// Append a text message to a thread.
    async fn post_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Message, AssistantError>;

    /// Ask the service to stop a run.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    async fn create_thread(&self) -> Result<Thread, AssistantError>;

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, AssistantError>;

    /// Start a run of `assistant_id` on a thread.
    async fn create_run(&self, thread_id: &str, assistant_id: &str)
    -> Result<Run, AssistantError>;

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantError>;
}
