//! Run driver: advances a remote run until it reaches a terminal outcome.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::assistant::{AssistantApi, ContentBlock, MessageRole, Run, RunStatus, Thread};
use crate::config::RunConfig;
use crate::error::RunError;
use crate::status::{Narrator, narrate};
use crate::tools::{ToolDispatcher, ToolRegistry};

/// Placeholder returned instead of image content.
pub const IMAGE_PLACEHOLDER: &str = "[Image response]";

/// Returned when a finished run left no assistant message on the thread.
pub const NO_RESPONSE: &str = "No response from assistant";

/// Failure reported when a run asks only for tools that are not registered.
pub const NO_TOOLS_AVAILABLE: &str = "none of the requested tools are available";

/// Build the user-facing message for a failed run.
pub fn failure_message(reason: Option<&str>) -> String {
    let reason = reason.filter(|r| !r.is_empty()).unwrap_or("Unknown error");
    format!("I encountered an error: {reason}")
}

/// Drives runs of the remote assistant to completion.
///
/// Cloning is cheap; every clone shares the same client and registry.
#[derive(Clone)]
pub struct RunDriver {
    api: Arc<dyn AssistantApi>,
    dispatcher: ToolDispatcher,
    config: RunConfig,
}

impl RunDriver {
    pub fn new(api: Arc<dyn AssistantApi>, registry: Arc<ToolRegistry>, config: RunConfig) -> Self {
        Self {
            api,
            dispatcher: ToolDispatcher::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Advance `run` until it is terminal and return the single content
    /// block that answers it.
    ///
    /// A failed run is not an error: its failure message is posted to the
    /// thread and returned as text.
    pub async fn perform_run(
        &self,
        run: Run,
        thread: &Thread,
        narrator: Option<Arc<dyn Narrator>>,
    ) -> Result<ContentBlock, RunError> {
        self.perform_run_with_cancel(run, thread, narrator, &CancellationToken::new())
            .await
    }

    /// Like [`perform_run`](Self::perform_run), but stops early when `cancel`
    /// fires. Tool calls still running at that point are aborted and the
    /// remote run is cancelled on a best-effort basis.
    pub async fn perform_run_with_cancel(
        &self,
        run: Run,
        thread: &Thread,
        narrator: Option<Arc<dyn Narrator>>,
        cancel: &CancellationToken,
    ) -> Result<ContentBlock, RunError> {
        let run_id = run.id.clone();
        let deadline = Instant::now() + self.config.timeout;

        tracing::info!(run_id = %run_id, thread_id = %thread.id, "Performing run");
        narrate(narrator.as_deref(), format!("🚀 Performing run {run_id}"));

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!(run_id = %run_id, "Run cancelled by caller");
                narrate(narrator.as_deref(), format!("❌ Run {run_id} cancelled"));
                self.cancel_remote(&thread.id, &run_id).await;
                Err(RunError::Cancelled { run_id })
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(
                    run_id = %run_id,
                    timeout_secs = self.config.timeout.as_secs(),
                    "Run exceeded its deadline"
                );
                narrate(narrator.as_deref(), format!("❌ Run {run_id} timed out"));
                self.cancel_remote(&thread.id, &run_id).await;
                Err(RunError::Timeout {
                    run_id,
                    timeout: self.config.timeout,
                })
            }
            result = self.drive(run, thread, narrator.clone()) => result,
        }
    }

    async fn drive(
        &self,
        mut run: Run,
        thread: &Thread,
        narrator: Option<Arc<dyn Narrator>>,
    ) -> Result<ContentBlock, RunError> {
        let mut rounds: u32 = 0;
        let mut last_status: Option<RunStatus> = None;

        loop {
            if last_status != Some(run.status) {
                tracing::debug!(run_id = %run.id, status = %run.status, "Run status changed");
                narrate(
                    narrator.as_deref(),
                    format!("🔄 Run {} is {}", run.id, run.status),
                );
                last_status = Some(run.status);
            }

            match run.status {
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => {
                    tokio::time::sleep(self.config.poll_interval).await;
                    run = self.api.retrieve_run(&thread.id, &run.id).await?;
                }
                RunStatus::RequiresAction => {
                    if rounds >= self.config.max_iterations {
                        tracing::warn!(
                            run_id = %run.id,
                            limit = self.config.max_iterations,
                            "Run exceeded tool-call round limit"
                        );
                        self.cancel_remote(&thread.id, &run.id).await;
                        return Err(RunError::IterationLimit {
                            run_id: run.id,
                            limit: self.config.max_iterations,
                        });
                    }
                    rounds += 1;

                    narrate(
                        narrator.as_deref(),
                        format!("💾 Handling tool calls for run {}", run.id),
                    );
                    let calls = run.pending_tool_calls();
                    let outcomes = self.dispatcher.dispatch(calls, narrator.clone()).await;
                    tracing::debug!(
                        run_id = %run.id,
                        round = rounds,
                        requested = calls.len(),
                        resolved = outcomes.len(),
                        "Tool calls dispatched"
                    );

                    if outcomes.is_empty() {
                        return Ok(self.stall(&run, thread, narrator.as_deref()).await);
                    }

                    run = self
                        .api
                        .submit_tool_outputs(&thread.id, &run.id, &outcomes)
                        .await?;
                }
                RunStatus::Failed => {
                    let reason = run.last_error.as_ref().map(|e| e.message.as_str());
                    return Ok(self.report_failure(&run, thread, reason, narrator.as_deref()).await);
                }
                RunStatus::Completed
                | RunStatus::Cancelled
                | RunStatus::Expired
                | RunStatus::Incomplete => {
                    return self.final_content(&run, thread, narrator.as_deref()).await;
                }
            }
        }
    }

    /// A run waiting on tools that produced no outcome would wait forever.
    /// It is cancelled and reported as failed instead.
    async fn stall(&self, run: &Run, thread: &Thread, narrator: Option<&dyn Narrator>) -> ContentBlock {
        tracing::warn!(run_id = %run.id, "No requested tool could be resolved");
        self.cancel_remote(&thread.id, &run.id).await;

        let message = failure_message(Some(NO_TOOLS_AVAILABLE));
        narrate(narrator, format!("❌ Run failed: {message}"));
        ContentBlock::text(message)
    }

    async fn report_failure(
        &self,
        run: &Run,
        thread: &Thread,
        reason: Option<&str>,
        narrator: Option<&dyn Narrator>,
    ) -> ContentBlock {
        let message = failure_message(reason);
        tracing::warn!(run_id = %run.id, reason = reason.unwrap_or("unknown"), "Run failed");
        narrate(narrator, format!("❌ Run failed: {message}"));

        if let Err(e) = self
            .api
            .post_message(&thread.id, MessageRole::Assistant, &message)
            .await
        {
            tracing::warn!(run_id = %run.id, error = %e, "Could not post failure message to thread");
        }

        ContentBlock::text(message)
    }

    async fn final_content(
        &self,
        run: &Run,
        thread: &Thread,
        narrator: Option<&dyn Narrator>,
    ) -> Result<ContentBlock, RunError> {
        let messages = self.api.list_messages(&thread.id).await?;
        let first_block = messages
            .into_iter()
            .find(|m| m.role == MessageRole::Assistant)
            .and_then(|m| m.content.into_iter().next());

        let block = match first_block {
            Some(block @ ContentBlock::Text { .. }) => block,
            Some(ContentBlock::ImageFile { .. } | ContentBlock::ImageUrl { .. }) => {
                ContentBlock::text(IMAGE_PLACEHOLDER)
            }
            Some(ContentBlock::Refusal { refusal }) => ContentBlock::text(refusal),
            None => ContentBlock::text(NO_RESPONSE),
        };

        let summary = block.as_text().unwrap_or(IMAGE_PLACEHOLDER);
        tracing::info!(run_id = %run.id, status = %run.status, "Run finished");
        narrate(narrator, format!("🚀 Assistant message: {summary}"));

        Ok(block)
    }

    async fn cancel_remote(&self, thread_id: &str, run_id: &str) {
        if let Err(e) = self.api.cancel_run(thread_id, run_id).await {
            tracing::warn!(run_id = %run_id, error = %e, "Best-effort run cancellation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::assistant::{LastError, PendingToolCall, RequiredAction};
    use crate::status::ChannelNarrator;
    use crate::testing::{ScriptedAssistant, StubTool, run_with_status};

    fn fast_config() -> RunConfig {
        RunConfig {
            max_iterations: 5,
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn driver(api: Arc<ScriptedAssistant>, tools: Vec<StubTool>) -> RunDriver {
        let registry = tools
            .into_iter()
            .fold(ToolRegistry::builder(), |b, t| b.register(t))
            .build()
            .unwrap();
        RunDriver::new(api, Arc::new(registry), fast_config())
    }

    fn thread() -> Thread {
        Thread {
            id: "thread_1".to_string(),
        }
    }

    fn requires(calls: Vec<PendingToolCall>) -> Run {
        Run {
            required_action: Some(RequiredAction::tool_calls(calls)),
            ..run_with_status("run_1", RunStatus::RequiresAction)
        }
    }

    #[test]
    fn failure_message_defaults_to_unknown() {
        assert_eq!(failure_message(None), "I encountered an error: Unknown error");
        assert_eq!(failure_message(Some("")), "I encountered an error: Unknown error");
        assert_eq!(failure_message(Some("boom")), "I encountered an error: boom");
    }

    #[tokio::test]
    async fn polls_pending_runs_until_completed() {
        let api = Arc::new(
            ScriptedAssistant::new()
                .then(run_with_status("run_1", RunStatus::InProgress))
                .then(run_with_status("run_1", RunStatus::Completed))
                .with_assistant_text("done"),
        );
        let d = driver(Arc::clone(&api), vec![]);

        let block = d
            .perform_run(run_with_status("run_1", RunStatus::Queued), &thread(), None)
            .await
            .unwrap();

        assert_eq!(block.as_text(), Some("done"));
        assert_eq!(api.retrieve_calls(), 2);
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn image_content_becomes_placeholder() {
        let api = Arc::new(ScriptedAssistant::new().with_assistant_content(vec![
            ContentBlock::ImageFile {
                image_file: crate::assistant::ImageFile {
                    file_id: "file_1".to_string(),
                },
            },
        ]));
        let d = driver(Arc::clone(&api), vec![]);
        let (narrator, mut rx) = ChannelNarrator::channel();

        let block = d
            .perform_run(
                run_with_status("run_1", RunStatus::Completed),
                &thread(),
                Some(Arc::new(narrator)),
            )
            .await
            .unwrap();

        assert_eq!(block.as_text(), Some(IMAGE_PLACEHOLDER));
        let mut last = String::new();
        while let Ok(m) = rx.try_recv() {
            last = m;
        }
        assert_eq!(last, "🚀 Assistant message: [Image response]");
    }

    #[tokio::test]
    async fn refusal_is_returned_as_text() {
        let refusal = ContentBlock::Refusal {
            refusal: "I can't help with that".to_string(),
        };
        let api = Arc::new(ScriptedAssistant::new().with_assistant_content(vec![refusal]));
        let d = driver(api, vec![]);

        let block = d
            .perform_run(run_with_status("run_1", RunStatus::Completed), &thread(), None)
            .await
            .unwrap();
        assert_eq!(block, ContentBlock::text("I can't help with that"));
    }

    #[tokio::test]
    async fn missing_assistant_message_yields_no_response() {
        let api = Arc::new(ScriptedAssistant::new());
        let d = driver(api, vec![]);

        let block = d
            .perform_run(run_with_status("run_1", RunStatus::Expired), &thread(), None)
            .await
            .unwrap();
        assert_eq!(block.as_text(), Some(NO_RESPONSE));
    }

    #[tokio::test]
    async fn failed_run_returns_message_even_if_posting_fails() {
        let api = Arc::new(ScriptedAssistant::new().failing_posts());
        let d = driver(Arc::clone(&api), vec![]);
        let failed = Run {
            last_error: Some(LastError {
                code: Some("server_error".to_string()),
                message: "rate limit".to_string(),
            }),
            ..run_with_status("run_1", RunStatus::Failed)
        };

        let block = d.perform_run(failed, &thread(), None).await.unwrap();

        assert_eq!(block.as_text(), Some("I encountered an error: rate limit"));
    }

    #[tokio::test]
    async fn iteration_limit_stops_endless_tool_requests() {
        let mut api = ScriptedAssistant::new();
        for _ in 0..10 {
            api = api.then(requires(vec![PendingToolCall::new(
                "call_1",
                "get_balance",
                "{}",
            )]));
        }
        let api = Arc::new(api);
        let d = driver(
            Arc::clone(&api),
            vec![StubTool::returning("get_balance", serde_json::json!("1"))],
        );

        let err = d
            .perform_run(
                requires(vec![PendingToolCall::new("call_0", "get_balance", "{}")]),
                &thread(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::IterationLimit { limit: 5, .. }));
        assert_eq!(api.submissions().len(), 5);
        assert_eq!(api.cancelled_runs(), vec!["run_1".to_string()]);
    }

    #[tokio::test]
    async fn deadline_bounds_a_stuck_run() {
        let api = Arc::new(ScriptedAssistant::new().repeat_last());
        let api_for_driver: Arc<dyn AssistantApi> = api.clone();
        let registry = Arc::new(ToolRegistry::empty());
        let d = RunDriver::new(
            api_for_driver,
            registry,
            RunConfig {
                max_iterations: 5,
                timeout: Duration::from_millis(50),
                poll_interval: Duration::from_millis(5),
            },
        );

        let err = d
            .perform_run(run_with_status("run_1", RunStatus::InProgress), &thread(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Timeout { .. }));
        assert_eq!(api.cancelled_runs(), vec!["run_1".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_token_stops_the_run() {
        let api = Arc::new(ScriptedAssistant::new().repeat_last());
        let d = driver(Arc::clone(&api), vec![]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = d
            .perform_run_with_cancel(
                run_with_status("run_1", RunStatus::Queued),
                &thread(),
                None,
                &cancel,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "cancelled");
        assert_eq!(api.cancelled_runs(), vec!["run_1".to_string()]);
    }

    #[tokio::test]
    async fn transport_errors_surface_as_assistant_errors() {
        // Nothing scripted: the first poll fails.
        let api = Arc::new(ScriptedAssistant::new());
        let d = driver(api, vec![]);

        let err = d
            .perform_run(run_with_status("run_1", RunStatus::Queued), &thread(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "assistant");
    }
}
