//! Tool trait and types.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for tool execution.
///
/// The `Display` form is what the assistant sees after the `Error: ` prefix.
/// Every variant renders only its message; the variant is for logs.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidParameters(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    ExternalService(String),

    #[error("{0}")]
    NotConfigured(String),
}

impl ToolError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameters(_) => "invalid_parameters",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::Timeout(_) => "timeout",
            Self::ExternalService(_) => "external_service",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The result data.
    pub result: serde_json::Value,
    /// Time taken.
    pub duration: Duration,
}

impl ToolOutput {
    /// Create a successful output with a JSON result.
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    /// Create a text output.
    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            result: serde_json::Value::String(text.into()),
            duration,
        }
    }

    /// Render the result as the text submitted back to the assistant.
    ///
    /// Strings pass through unchanged; every other value is compact JSON,
    /// which is deterministic and lossless for `serde_json::Value`.
    pub fn to_output_text(&self) -> String {
        stringify_result(&self.result)
    }
}

/// Convert a tool result into its textual form.
pub fn stringify_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Definition of a tool's parameters using JSON Schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Create a new tool schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Function definition in the shape the assistant service expects.
    pub fn to_function_definition(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Trait for tools the assistant can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get a description of what the tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-parsed parameters.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Maximum time this tool is allowed to run before the dispatcher gives up.
    /// Default: 60 seconds.
    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Get the tool schema for function calling.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Extract a required string parameter from a JSON object.
///
/// Returns `ToolError::InvalidParameters` if the key is missing or not a string.
pub fn require_str<'a>(params: &'a serde_json::Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{}' parameter", name)))
}

/// Deserialize parameters into a typed struct.
pub fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

/// Parse the raw argument string sent by the assistant and check it against
/// the tool's declared schema.
///
/// Only the top-level shape is enforced: the arguments must be a JSON object
/// and every key listed in `"required"` must be present. An empty argument
/// string is treated as `{}`.
pub fn parse_arguments(
    raw: &str,
    schema: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let trimmed = raw.trim();
    let params: serde_json::Value = if trimmed.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(trimmed).map_err(|e| {
            ToolError::InvalidParameters(format!("arguments are not valid JSON: {e}"))
        })?
    };

    check_arguments(params, schema)
}

/// Check already-decoded arguments against the tool's declared schema.
///
/// `null` is treated as `{}`.
pub fn check_arguments(
    params: serde_json::Value,
    schema: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let params = if params.is_null() {
        serde_json::json!({})
    } else {
        params
    };

    let Some(object) = params.as_object() else {
        return Err(ToolError::InvalidParameters(
            "arguments must be a JSON object".to_string(),
        ));
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        let missing: Vec<&str> = required
            .iter()
            .filter_map(|r| r.as_str())
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::InvalidParameters(format!(
                "missing required parameter(s): {}",
                missing.join(", ")
            )));
        }
    }

    Ok(params)
}

/// Structural problems in a tool's `parameters_schema()` that would make
/// the assistant service reject the function definition.
///
/// Checked when the registry is built; an empty list means the schema is
/// usable. Object schemas (top level, nested properties, array items) need a
/// `properties` map and may only mark declared properties as `required`.
/// Array properties need an `items` schema. Properties without a `type` are
/// free-form and accepted.
pub fn validate_tool_schema(schema: &serde_json::Value, tool_name: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if schema.get("type").and_then(serde_json::Value::as_str) == Some("object") {
        check_object_schema(schema, tool_name, &mut problems);
    } else {
        problems.push(format!(
            "{tool_name}: parameters must be a schema of type \"object\""
        ));
    }
    problems
}

fn check_object_schema(schema: &serde_json::Value, at: &str, problems: &mut Vec<String>) {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        problems.push(format!("{at}: \"properties\" must be an object"));
        return;
    };

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .into_iter()
        .flatten()
        .filter_map(|key| key.as_str());
    for key in required.filter(|key| !properties.contains_key(*key)) {
        problems.push(format!("{at}: \"{key}\" is required but not declared"));
    }

    for (key, property) in properties {
        check_property_schema(property, &format!("{at}.{key}"), problems);
    }
}

fn check_property_schema(property: &serde_json::Value, at: &str, problems: &mut Vec<String>) {
    match property.get("type").and_then(|t| t.as_str()) {
        Some("object") => check_object_schema(property, at, problems),
        Some("array") => match property.get("items") {
            Some(items) => check_property_schema(items, &format!("{at}[]"), problems),
            None => problems.push(format!("{at}: array needs an \"items\" schema")),
        },
        _ => {}
    }
}
