//! Concurrent execution of a batch of requested tool calls.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::assistant::{PendingToolCall, ToolOutcome};
use crate::status::{Narrator, narrate};
use crate::tools::ToolRegistry;
use crate::tools::redaction::redact_sensitive_json;
use crate::tools::tool::{Tool, ToolError, ToolOutput, parse_arguments};

/// Output text used when a tool task dies without producing a result.
const TASK_FAILED_OUTPUT: &str = "Error: tool task failed";

/// Resolves tool calls against the registry and runs them.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run every resolvable call in `calls` concurrently and collect one
    /// outcome per resolved call.
    ///
    /// Calls naming an unregistered tool are narrated and dropped, so the
    /// result may be shorter than the input (or empty). Handler failures
    /// become `"Error: <message>"` outcomes and never affect sibling calls.
    /// Outcome order is unspecified; match on `tool_call_id`.
    ///
    /// Dropping the returned future aborts every call still running.
    pub async fn dispatch(
        &self,
        calls: &[PendingToolCall],
        narrator: Option<Arc<dyn Narrator>>,
    ) -> Vec<ToolOutcome> {
        let mut join_set = JoinSet::new();
        let mut slots: Vec<(String, Option<ToolOutcome>)> = Vec::with_capacity(calls.len());

        for call in calls {
            let Some(tool) = self.registry.get(call.name()) else {
                tracing::warn!(
                    tool = %call.name(),
                    call_id = %call.id,
                    "Requested tool is not registered, dropping call"
                );
                narrate(narrator.as_deref(), format!("❌ Tool {} not found", call.name()));
                continue;
            };

            narrate(narrator.as_deref(), format!("💾 Executing: {}", call.name()));

            let slot = slots.len();
            slots.push((call.id.clone(), None));

            let call = call.clone();
            let narrator = narrator.clone();
            join_set.spawn(async move {
                let output = execute_call(tool.as_ref(), &call, narrator.as_deref()).await;
                (
                    slot,
                    ToolOutcome {
                        tool_call_id: call.id,
                        output,
                    },
                )
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, outcome)) => slots[slot].1 = Some(outcome),
                Err(e) if e.is_panic() => {
                    tracing::error!("Tool execution task panicked: {}", e);
                }
                Err(e) => {
                    tracing::error!("Tool execution task cancelled: {}", e);
                }
            }
        }

        slots
            .into_iter()
            .map(|(call_id, outcome)| {
                outcome.unwrap_or_else(|| {
                    tracing::error!(call_id = %call_id, "Filling failed task slot with error");
                    ToolOutcome {
                        tool_call_id: call_id,
                        output: TASK_FAILED_OUTPUT.to_string(),
                    }
                })
            })
            .collect()
    }
}

/// Parse, execute and stringify a single call.
async fn execute_call(
    tool: &dyn Tool,
    call: &PendingToolCall,
    narrator: Option<&dyn Narrator>,
) -> String {
    let result = match parse_arguments(&call.function.arguments, &tool.parameters_schema()) {
        Ok(params) => execute_tool(tool, params).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => output.to_output_text(),
        Err(e) => {
            let message = e.to_string();
            narrate(
                narrator,
                format!("❌ Error executing {}: {}", call.name(), message),
            );
            format!("Error: {message}")
        }
    }
}

/// Execute a tool with its timeout, logging the outcome.
pub async fn execute_tool(
    tool: &dyn Tool,
    params: serde_json::Value,
) -> Result<ToolOutput, ToolError> {
    let name = tool.name();
    tracing::debug!(
        tool = %name,
        params = %redact_sensitive_json(&params),
        "Tool call started"
    );

    let timeout = tool.execution_timeout();
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, tool.execute(params)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(output)) => {
            tracing::debug!(tool = %name, elapsed_ms, "Tool call succeeded");
            Ok(output)
        }
        Ok(Err(e)) => {
            tracing::debug!(
                tool = %name,
                elapsed_ms,
                kind = e.kind(),
                error = %e,
                "Tool call failed"
            );
            Err(e)
        }
        Err(_) => {
            tracing::debug!(
                tool = %name,
                elapsed_ms,
                timeout_secs = timeout.as_secs(),
                "Tool call timed out"
            );
            Err(ToolError::Timeout(timeout))
        }
    }
}
