//! Process-wide orchestrator context, created once at startup.

use std::sync::Arc;

use crate::agent::driver::RunDriver;
use crate::assistant::{AssistantApi, OpenAiAssistantClient};
use crate::config::{AssistantConfig, Config, RunConfig};
use crate::error::Error;
use crate::status::StatusReporter;
use crate::tools::ToolRegistry;

/// Everything a run needs, wired together explicitly.
///
/// Holds the assistant client, the frozen tool registry and the status
/// reporter. Nothing here is global; the binary builds one instance and
/// shares it behind an `Arc`.
pub struct Orchestrator {
    api: Arc<dyn AssistantApi>,
    registry: Arc<ToolRegistry>,
    reporter: Arc<StatusReporter>,
    driver: RunDriver,
    assistant: AssistantConfig,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        registry: Arc<ToolRegistry>,
        reporter: Arc<StatusReporter>,
        assistant: AssistantConfig,
        run: RunConfig,
    ) -> Self {
        let driver = RunDriver::new(Arc::clone(&api), Arc::clone(&registry), run);
        Self {
            api,
            registry,
            reporter,
            driver,
            assistant,
        }
    }

    /// Build the production context: HTTPS client, built-in tools and an
    /// empty status reporter.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let api = OpenAiAssistantClient::new(config.assistant.clone())?;
        let registry = ToolRegistry::builder()
            .register_builtin_tools(&config.tools)
            .build()?;

        tracing::info!(
            tools = registry.len(),
            assistant_id = config.assistant.assistant_id.as_deref().unwrap_or("<created on demand>"),
            "Orchestrator ready"
        );

        Ok(Self::new(
            Arc::new(api),
            Arc::new(registry),
            Arc::new(StatusReporter::new()),
            config.assistant.clone(),
            config.run.clone(),
        ))
    }

    pub fn api(&self) -> &Arc<dyn AssistantApi> {
        &self.api
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn reporter(&self) -> &Arc<StatusReporter> {
        &self.reporter
    }

    pub fn driver(&self) -> &RunDriver {
        &self.driver
    }

    pub fn assistant_config(&self) -> &AssistantConfig {
        &self.assistant
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("assistant_id", &self.assistant.assistant_id)
            .finish()
    }
}
