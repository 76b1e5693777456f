//! Test doubles shared by unit and integration tests.
//!
//! Provides:
//! - [`StubTool`]: a configurable tool returning a fixed result, failing,
//!   panicking or waiting on a barrier
//! - [`ScriptedAssistant`]: an in-memory [`AssistantApi`] that replays a
//!   scripted sequence of run states and records what the driver sent
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use onchain_agent::assistant::RunStatus;
//! use onchain_agent::testing::{ScriptedAssistant, run_with_status};
//!
//! let api = Arc::new(
//!     ScriptedAssistant::new()
//!         .then(run_with_status("run_1", RunStatus::Completed))
//!         .with_assistant_text("hello"),
//! );
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::assistant::{
    Assistant, AssistantApi, AssistantSpec, ContentBlock, Message, MessageRole, Run, RunStatus,
    Thread, ToolOutcome,
};
use crate::error::AssistantError;
use crate::tools::{Tool, ToolError, ToolOutput};

/// Thread id handed out by [`ScriptedAssistant::create_thread`].
pub const SCRIPTED_THREAD_ID: &str = "thread_scripted";

/// Assistant id handed out by [`ScriptedAssistant::create_assistant`].
pub const SCRIPTED_ASSISTANT_ID: &str = "asst_scripted";

/// A run on `thread_1` with the given status and nothing else set.
pub fn run_with_status(id: impl Into<String>, status: RunStatus) -> Run {
    Run {
        id: id.into(),
        thread_id: "thread_1".to_string(),
        assistant_id: None,
        status,
        required_action: None,
        last_error: None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone)]
enum StubBehavior {
    Return(serde_json::Value),
    Fail(String),
    Error(fn() -> ToolError),
    Panic,
}

/// A configurable tool for tests.
///
/// Supports:
/// - fixed results, failures and panics
/// - a custom parameter schema
/// - an artificial delay or a shared [`Barrier`] to prove concurrency
/// - counting of started and completed executions
pub struct StubTool {
    name: String,
    schema: serde_json::Value,
    behavior: StubBehavior,
    delay: Option<Duration>,
    barrier: Option<Arc<Barrier>>,
    timeout: Duration,
    calls: Arc<AtomicU32>,
    completions: Arc<AtomicU32>,
}

impl StubTool {
    fn with_behavior(name: impl Into<String>, behavior: StubBehavior) -> Self {
        Self {
            name: name.into(),
            schema: serde_json::json!({"type": "object", "properties": {}}),
            behavior,
            delay: None,
            barrier: None,
            timeout: Duration::from_secs(60),
            calls: Arc::new(AtomicU32::new(0)),
            completions: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A tool that always succeeds with `result`.
    pub fn returning(name: impl Into<String>, result: serde_json::Value) -> Self {
        Self::with_behavior(name, StubBehavior::Return(result))
    }

    /// A tool that always fails with `ToolError::ExecutionFailed(message)`.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(name, StubBehavior::Fail(message.into()))
    }

    /// A tool that fails with whatever error `make` builds.
    pub fn erroring(name: impl Into<String>, make: fn() -> ToolError) -> Self {
        Self::with_behavior(name, StubBehavior::Error(make))
    }

    /// A tool whose handler panics.
    pub fn panicking(name: impl Into<String>) -> Self {
        Self::with_behavior(name, StubBehavior::Panic)
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait on `barrier` before producing a result.
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Counter of executions started. Shared, so it survives registration.
    pub fn call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    /// Counter of executions that ran to the end.
    pub fn completion_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.completions)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Stub tool for tests"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        let result = match &self.behavior {
            StubBehavior::Return(value) => Ok(ToolOutput::success(
                value.clone(),
                Duration::from_millis(1),
            )),
            StubBehavior::Fail(message) => Err(ToolError::ExecutionFailed(message.clone())),
            StubBehavior::Error(make) => Err(make()),
            StubBehavior::Panic => panic!("stub tool '{}' panicked", self.name),
        };
        self.completions.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}

/// In-memory assistant service driven by a script of run states.
///
/// Every operation that returns a run (`create_run`, `retrieve_run`,
/// `submit_tool_outputs`) pops the next scripted state. When the script is
/// exhausted the call fails, unless [`repeat_last`](Self::repeat_last) was
/// set, in which case the last state (or an `in_progress` run) is repeated.
#[derive(Default)]
pub struct ScriptedAssistant {
    script: Mutex<VecDeque<Run>>,
    last: Mutex<Option<Run>>,
    repeat_last: bool,
    fail_posts: bool,
    messages: Mutex<Vec<Message>>,
    submissions: Mutex<Vec<Vec<ToolOutcome>>>,
    posted: Mutex<Vec<(MessageRole, String)>>,
    cancelled: Mutex<Vec<String>>,
    created_runs: Mutex<Vec<(String, String)>>,
    created_assistants: Mutex<Vec<AssistantSpec>>,
    threads_created: AtomicU32,
    retrieve_calls: AtomicU32,
    message_seq: AtomicU32,
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a run state to the script.
    pub fn then(self, run: Run) -> Self {
        lock(&self.script).push_back(run);
        self
    }

    /// Keep returning the last state once the script runs out.
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Make `post_message` fail.
    pub fn failing_posts(mut self) -> Self {
        self.fail_posts = true;
        self
    }

    /// Seed the thread with an assistant text message.
    pub fn with_assistant_text(self, text: impl Into<String>) -> Self {
        self.with_assistant_content(vec![ContentBlock::text(text)])
    }

    /// Seed the thread with an assistant message holding `content`.
    pub fn with_assistant_content(self, content: Vec<ContentBlock>) -> Self {
        let message = self.make_message(MessageRole::Assistant, content);
        lock(&self.messages).insert(0, message);
        self
    }

    /// Tool outcomes submitted so far, one entry per submission.
    pub fn submissions(&self) -> Vec<Vec<ToolOutcome>> {
        lock(&self.submissions).clone()
    }

    /// Messages posted through `post_message`, oldest first.
    pub fn posted_messages(&self) -> Vec<(MessageRole, String)> {
        lock(&self.posted).clone()
    }

    /// Ids of runs the caller asked to cancel.
    pub fn cancelled_runs(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }

    /// `(thread_id, assistant_id)` of every created run.
    pub fn created_runs(&self) -> Vec<(String, String)> {
        lock(&self.created_runs).clone()
    }

    pub fn created_assistants(&self) -> Vec<AssistantSpec> {
        lock(&self.created_assistants).clone()
    }

    pub fn threads_created(&self) -> u32 {
        self.threads_created.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> u32 {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    fn make_message(&self, role: MessageRole, content: Vec<ContentBlock>) -> Message {
        let seq = self.message_seq.fetch_add(1, Ordering::SeqCst);
        Message {
            id: format!("msg_{seq}"),
            role,
            content,
            created_at: i64::from(seq),
        }
    }

    fn next_run(&self, run_id: &str, endpoint: &str) -> Result<Run, AssistantError> {
        if let Some(run) = lock(&self.script).pop_front() {
            *lock(&self.last) = Some(run.clone());
            return Ok(run);
        }
        if self.repeat_last {
            return Ok(lock(&self.last)
                .clone()
                .unwrap_or_else(|| run_with_status(run_id, RunStatus::InProgress)));
        }
        Err(AssistantError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: "script exhausted".to_string(),
        })
    }
}

#[async_trait]
impl AssistantApi for ScriptedAssistant {
    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        self.next_run(run_id, "retrieve_run")
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutcome],
    ) -> Result<Run, AssistantError> {
        lock(&self.submissions).push(outputs.to_vec());
        self.next_run(run_id, "submit_tool_outputs")
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<Message>, AssistantError> {
        Ok(lock(&self.messages).clone())
    }

    async fn post_message(
        &self,
        _thread_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Message, AssistantError> {
        if self.fail_posts {
            return Err(AssistantError::Api {
                endpoint: "messages".to_string(),
                status: 400,
                body: "thread is locked".to_string(),
            });
        }
        lock(&self.posted).push((role, text.to_string()));
        let message = self.make_message(role, vec![ContentBlock::text(text)]);
        lock(&self.messages).insert(0, message.clone());
        Ok(message)
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        lock(&self.cancelled).push(run_id.to_string());
        Ok(run_with_status(run_id, RunStatus::Cancelling))
    }

    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        self.threads_created.fetch_add(1, Ordering::SeqCst);
        Ok(Thread {
            id: SCRIPTED_THREAD_ID.to_string(),
        })
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, AssistantError> {
        Ok(Thread {
            id: thread_id.to_string(),
        })
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<Run, AssistantError> {
        lock(&self.created_runs).push((thread_id.to_string(), assistant_id.to_string()));
        self.next_run("run_scripted", "create_run")
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantError> {
        lock(&self.created_assistants).push(spec.clone());
        Ok(Assistant {
            id: SCRIPTED_ASSISTANT_ID.to_string(),
            name: Some(spec.name.clone()),
            model: Some(spec.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let api = ScriptedAssistant::new()
            .then(run_with_status("run_1", RunStatus::InProgress))
            .then(run_with_status("run_1", RunStatus::Completed));

        assert_eq!(
            api.retrieve_run("t", "run_1").await.unwrap().status,
            RunStatus::InProgress
        );
        assert_eq!(
            api.retrieve_run("t", "run_1").await.unwrap().status,
            RunStatus::Completed
        );
        assert!(api.retrieve_run("t", "run_1").await.is_err());
    }

    #[tokio::test]
    async fn posted_messages_are_listed_newest_first() {
        let api = ScriptedAssistant::new().with_assistant_text("earlier");
        api.post_message("t", MessageRole::User, "hi").await.unwrap();

        let messages = api.list_messages("t").await.unwrap();
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content[0].as_text(), Some("earlier"));
    }

    #[test]
    fn cancel_is_recorded_without_consuming_script() {
        let api = ScriptedAssistant::new().then(run_with_status("run_1", RunStatus::Completed));

        let cancelled = tokio_test::block_on(api.cancel_run("t", "run_1")).unwrap();

        assert_eq!(cancelled.status, RunStatus::Cancelling);
        assert_eq!(api.cancelled_runs(), vec!["run_1".to_string()]);
        let next = tokio_test::block_on(api.retrieve_run("t", "run_1")).unwrap();
        assert_eq!(next.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn stub_tool_counts_calls() {
        let tool = StubTool::failing("broken", "nope");
        let calls = tool.call_counter();
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
