//! Implementations of the one-shot CLI subcommands.

use std::sync::Arc;

use anyhow::Context;

use crate::agent::{ChatService, Orchestrator};
use crate::config::{Config, ToolsConfig};
use crate::status::Narrator;
use crate::tools::{ToolRegistry, check_arguments, execute_tool};

fn builtin_registry(config: &ToolsConfig) -> anyhow::Result<ToolRegistry> {
    Ok(ToolRegistry::builder()
        .register_builtin_tools(config)
        .build()?)
}

/// Print the name and description of every built-in tool.
pub fn run_tools_command() -> anyhow::Result<()> {
    let registry = builtin_registry(&ToolsConfig::resolve()?)?;
    for schema in registry.schemas() {
        println!("{:<20} {}", schema.name, schema.description);
    }
    Ok(())
}

/// Invoke one built-in tool and print its JSON result.
pub async fn run_tool_command(name: &str, params: &str) -> anyhow::Result<()> {
    let registry = builtin_registry(&ToolsConfig::resolve()?)?;
    let tool = registry
        .get(name)
        .with_context(|| format!("unknown tool '{name}'; known: {}", registry.list().join(", ")))?;

    let params: serde_json::Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;
    let params = check_arguments(params, &tool.parameters_schema())?;
    let output = execute_tool(tool.as_ref(), params).await?;

    println!("{}", serde_json::to_string_pretty(&output.result)?);
    Ok(())
}

/// Run one chat turn, printing progress to stderr and the reply to stdout.
pub async fn run_chat_command(message: &str, thread: Option<&str>) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let chat = ChatService::new(Arc::new(Orchestrator::from_config(&config)?));

    let progress: Arc<dyn Narrator> = Arc::new(|message: &str| eprintln!("{message}"));
    let reply = chat
        .chat_with_narrator(message, thread, Some(progress))
        .await?;

    eprintln!("thread: {}  run: {}", reply.thread_id, reply.run_id);
    println!("{}", reply.reply);
    Ok(())
}
