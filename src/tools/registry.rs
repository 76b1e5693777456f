//! Immutable name → tool lookup.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::ConfigError;
use crate::tools::builtin::{FetchPodcastDetailsTool, UploadToIpfsTool, VerifyStatementTool};
use crate::tools::tool::{Tool, ToolSchema, validate_tool_schema};

/// Registry of the tools the assistant may call.
///
/// Built once at startup through [`ToolRegistryBuilder`] and never mutated
/// afterwards, so it can be shared behind an `Arc` and read concurrently
/// without locking.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Start building a registry.
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas of every registered tool, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Function definitions for every tool, as sent when creating an assistant.
    pub fn function_definitions(&self) -> Vec<serde_json::Value> {
        self.schemas()
            .iter()
            .map(ToolSchema::to_function_definition)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

/// Collects tools before freezing them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Add a tool.
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Add the built-in tools shipped with the agent.
    pub fn register_builtin_tools(self, config: &ToolsConfig) -> Self {
        self.register(VerifyStatementTool::new(config))
            .register(UploadToIpfsTool::new(config))
            .register(FetchPodcastDetailsTool::new(config))
    }

    /// Freeze the registry.
    ///
    /// Fails on the first duplicate name or structurally invalid parameter
    /// schema; both are configuration mistakes to be fixed before startup.
    pub fn build(self) -> Result<ToolRegistry, ConfigError> {
        let mut tools = HashMap::with_capacity(self.tools.len());

        for tool in self.tools {
            let name = tool.name().to_string();

            let errors = validate_tool_schema(&tool.parameters_schema(), &name);
            if !errors.is_empty() {
                return Err(ConfigError::InvalidToolSchema {
                    name,
                    errors: errors.join("; "),
                });
            }

            match tools.entry(name) {
                Entry::Occupied(entry) => {
                    return Err(ConfigError::DuplicateTool {
                        name: entry.key().clone(),
                    });
                }
                Entry::Vacant(entry) => {
                    tracing::debug!(tool = %entry.key(), "Registered tool");
                    entry.insert(tool);
                }
            }
        }

        Ok(ToolRegistry { tools })
    }
}
