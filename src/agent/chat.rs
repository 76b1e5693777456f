//! Chat entry point: one user message in, one assistant reply out.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::agent::context::Orchestrator;
use crate::assistant::{AssistantSpec, ContentBlock, MessageRole, Thread};
use crate::error::{Error, InvokeError};
use crate::status::Narrator;
use crate::tools::{check_arguments, execute_tool};

/// Reply used when the final content block carries no text.
const EMPTY_REPLY: &str = "No response.";

/// Result of one chat turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub thread_id: String,
    pub run_id: String,
}

/// Runs chat turns against the remote assistant.
///
/// The assistant is resolved lazily: the configured `ASSISTANT_ID` when
/// present, otherwise one is created on first use with the registry's
/// function definitions and reused for the lifetime of the service.
pub struct ChatService {
    orchestrator: Arc<Orchestrator>,
    assistant_id: OnceCell<String>,
}

impl ChatService {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let assistant_id = match &orchestrator.assistant_config().assistant_id {
            Some(id) => OnceCell::new_with(Some(id.clone())),
            None => OnceCell::new(),
        };
        Self {
            orchestrator,
            assistant_id,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// The assistant id, creating the assistant if needed.
    ///
    /// Concurrent first callers share one creation; a failed creation is
    /// retried by the next caller.
    pub async fn ensure_assistant(&self) -> Result<&str, Error> {
        let id = self
            .assistant_id
            .get_or_try_init(|| async {
                let config = self.orchestrator.assistant_config();
                let spec = AssistantSpec {
                    name: config.name.clone(),
                    model: config.model.clone(),
                    instructions: config.instructions.clone(),
                    tools: self.orchestrator.registry().function_definitions(),
                };
                let assistant = self.orchestrator.api().create_assistant(&spec).await?;
                tracing::info!(
                    assistant_id = %assistant.id,
                    model = %spec.model,
                    tools = spec.tools.len(),
                    "Created assistant"
                );
                Ok::<_, Error>(assistant.id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Start a new conversation thread.
    pub async fn create_thread(&self) -> Result<Thread, Error> {
        let thread = self.orchestrator.api().create_thread().await?;
        tracing::debug!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    /// Send `message` on `thread_id` (or a new thread) and wait for the reply.
    pub async fn chat(&self, message: &str, thread_id: Option<&str>) -> Result<ChatReply, Error> {
        self.chat_with_narrator(message, thread_id, None).await
    }

    /// Like [`chat`](Self::chat), additionally narrating progress to `extra`.
    ///
    /// Progress always goes to the status reporter under the run id.
    pub async fn chat_with_narrator(
        &self,
        message: &str,
        thread_id: Option<&str>,
        extra: Option<Arc<dyn Narrator>>,
    ) -> Result<ChatReply, Error> {
        let api = self.orchestrator.api();
        let assistant_id = self.ensure_assistant().await?;

        let thread = match thread_id {
            Some(id) => api.retrieve_thread(id).await?,
            None => self.create_thread().await?,
        };

        api.post_message(&thread.id, MessageRole::User, message)
            .await?;
        let run = api.create_run(&thread.id, assistant_id).await?;
        let run_id = run.id.clone();
        tracing::info!(run_id = %run_id, thread_id = %thread.id, "Started run");

        let reporter_sink: Arc<dyn Narrator> =
            Arc::new(self.orchestrator.reporter().narrator(run_id.clone()));
        let narrator: Arc<dyn Narrator> = match extra {
            Some(extra) => Arc::new(
                crate::status::TeeNarrator::new()
                    .with(reporter_sink)
                    .with(extra),
            ),
            None => reporter_sink,
        };

        let block = self
            .orchestrator
            .driver()
            .perform_run(run, &thread, Some(narrator))
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    run_id = %run_id,
                    kind = e.kind(),
                    error = %e,
                    "Run ended without a reply"
                );
            })?;

        Ok(ChatReply {
            reply: reply_text(&block),
            thread_id: thread.id,
            run_id,
        })
    }

    /// Invoke a registered tool directly, outside of any run.
    pub async fn invoke_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        let tool = self
            .orchestrator
            .registry()
            .get(name)
            .ok_or_else(|| InvokeError::UnknownTool(name.to_string()))?;

        let params = check_arguments(params, &tool.parameters_schema())?;
        let output = execute_tool(tool.as_ref(), params).await?;
        Ok(output.result)
    }
}

/// Flatten the final content block into reply text.
pub fn reply_text(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text.value.clone(),
        ContentBlock::Refusal { refusal } => refusal.clone(),
        ContentBlock::ImageFile { .. } | ContentBlock::ImageUrl { .. } => EMPTY_REPLY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::assistant::RunStatus;
    use crate::config::{AssistantConfig, RunConfig};
    use crate::status::{ChannelNarrator, StatusReporter};
    use crate::testing::{
        SCRIPTED_ASSISTANT_ID, SCRIPTED_THREAD_ID, ScriptedAssistant, StubTool, run_with_status,
    };
    use crate::tools::{ToolError, ToolRegistry};

    fn service(api: Arc<ScriptedAssistant>, assistant_id: Option<&str>) -> ChatService {
        let registry = ToolRegistry::builder()
            .register(StubTool::returning(
                "get_balance",
                serde_json::json!({"balance": "1.5"}),
            ))
            .register(StubTool::failing("send_transaction", "insufficient funds"))
            .register(
                StubTool::returning("verify_statement", serde_json::json!("ok")).with_schema(
                    serde_json::json!({
                        "type": "object",
                        "properties": {"statement": {"type": "string"}},
                        "required": ["statement"]
                    }),
                ),
            )
            .build()
            .unwrap();
        let mut assistant = AssistantConfig::new("sk-test", "http://127.0.0.1:9");
        assistant.assistant_id = assistant_id.map(str::to_string);
        let run = RunConfig {
            poll_interval: Duration::from_millis(1),
            ..RunConfig::default()
        };
        ChatService::new(Arc::new(Orchestrator::new(
            api,
            Arc::new(registry),
            Arc::new(StatusReporter::new()),
            assistant,
            run,
        )))
    }

    #[tokio::test]
    async fn chat_creates_assistant_thread_and_run() {
        let api = Arc::new(
            ScriptedAssistant::new()
                .then(run_with_status("run_1", RunStatus::Queued))
                .then(run_with_status("run_1", RunStatus::Completed))
                .with_assistant_text("Your balance is 1.5 ETH"),
        );
        let chat = service(Arc::clone(&api), None);

        let reply = chat.chat("what is my balance?", None).await.unwrap();

        assert_eq!(
            reply,
            ChatReply {
                reply: "Your balance is 1.5 ETH".to_string(),
                thread_id: SCRIPTED_THREAD_ID.to_string(),
                run_id: "run_1".to_string(),
            }
        );
        assert_eq!(api.threads_created(), 1);
        assert_eq!(
            api.posted_messages(),
            vec![(MessageRole::User, "what is my balance?".to_string())]
        );
        assert_eq!(
            api.created_runs(),
            vec![(
                SCRIPTED_THREAD_ID.to_string(),
                SCRIPTED_ASSISTANT_ID.to_string()
            )]
        );
        let spec = &api.created_assistants()[0];
        assert_eq!(spec.tools.len(), 3);

        let log = chat.orchestrator().reporter().snapshot("run_1");
        assert_eq!(log.first().map(String::as_str), Some("🚀 Performing run run_1"));
    }

    #[tokio::test]
    async fn assistant_is_created_once() {
        let api = Arc::new(
            ScriptedAssistant::new()
                .then(run_with_status("run_1", RunStatus::Completed))
                .then(run_with_status("run_2", RunStatus::Completed))
                .with_assistant_text("hi"),
        );
        let chat = service(Arc::clone(&api), None);

        chat.chat("one", None).await.unwrap();
        chat.chat("two", Some("thread_existing")).await.unwrap();

        assert_eq!(api.created_assistants().len(), 1);
        assert_eq!(api.threads_created(), 1);
        assert_eq!(api.created_runs()[1].0, "thread_existing");
    }

    #[tokio::test]
    async fn configured_assistant_id_skips_creation() {
        let api = Arc::new(
            ScriptedAssistant::new()
                .then(run_with_status("run_1", RunStatus::Completed))
                .with_assistant_text("hi"),
        );
        let chat = service(Arc::clone(&api), Some("asst_configured"));

        chat.chat("hello", None).await.unwrap();

        assert!(api.created_assistants().is_empty());
        assert_eq!(api.created_runs()[0].1, "asst_configured");
    }

    #[tokio::test]
    async fn extra_narrator_sees_progress() {
        let api = Arc::new(
            ScriptedAssistant::new()
                .then(run_with_status("run_1", RunStatus::Completed))
                .with_assistant_text("done"),
        );
        let chat = service(api, None);
        let (narrator, mut rx) = ChannelNarrator::channel();

        chat.chat_with_narrator("go", None, Some(Arc::new(narrator)))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), "🚀 Performing run run_1");
    }

    #[tokio::test]
    async fn invoke_tool_returns_raw_result() {
        let chat = service(Arc::new(ScriptedAssistant::new()), None);

        let result = chat
            .invoke_tool("get_balance", serde_json::Value::Null)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"balance": "1.5"}));
    }

    #[tokio::test]
    async fn invoke_tool_errors() {
        let chat = service(Arc::new(ScriptedAssistant::new()), None);

        let unknown = chat
            .invoke_tool("deploy_erc20", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(unknown, InvokeError::UnknownTool(ref n) if n == "deploy_erc20"));

        let failed = chat
            .invoke_tool("send_transaction", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(failed.to_string(), "insufficient funds");

        let missing = chat
            .invoke_tool("verify_statement", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            InvokeError::Tool(ToolError::InvalidParameters(_))
        ));
    }

    #[test]
    fn reply_text_flattens_blocks() {
        assert_eq!(reply_text(&ContentBlock::text("hi")), "hi");
        assert_eq!(
            reply_text(&ContentBlock::Refusal {
                refusal: "no".to_string()
            }),
            "no"
        );
        assert_eq!(
            reply_text(&ContentBlock::ImageUrl {
                image_url: crate::assistant::ImageUrl {
                    url: "https://x".to_string()
                }
            }),
            EMPTY_REPLY
        );
    }
}
