//! Validates that the built-in tool schemas are well formed and that the
//! registry rejects broken ones at startup.

use onchain_agent::config::ToolsConfig;
use onchain_agent::error::ConfigError;
use onchain_agent::testing::StubTool;
use onchain_agent::tools::{ToolRegistry, validate_tool_schema};

#[test]
fn all_builtin_tool_schemas_are_valid() {
    let registry = ToolRegistry::builder()
        .register_builtin_tools(&ToolsConfig::default())
        .build()
        .expect("built-in tools must register cleanly");

    assert!(!registry.is_empty());

    let mut all_errors = Vec::new();
    for schema in registry.schemas() {
        let errors = validate_tool_schema(&schema.parameters, &schema.name);
        if !errors.is_empty() {
            all_errors.push(format!(
                "Tool '{}' has schema errors:\n  {}",
                schema.name,
                errors.join("\n  ")
            ));
        }
    }
    assert!(all_errors.is_empty(), "{}", all_errors.join("\n"));
}

#[test]
fn function_definitions_use_the_function_envelope() {
    let registry = ToolRegistry::builder()
        .register_builtin_tools(&ToolsConfig::default())
        .build()
        .unwrap();

    for def in registry.function_definitions() {
        assert_eq!(def["type"], "function");
        assert!(def["function"]["name"].is_string());
        assert!(def["function"]["description"].is_string());
        assert_eq!(def["function"]["parameters"]["type"], "object");
    }
}

#[test]
fn required_key_missing_from_properties_is_rejected() {
    let broken = StubTool::returning("read_contract", serde_json::json!(null)).with_schema(
        serde_json::json!({
            "type": "object",
            "properties": {"address": {"type": "string"}},
            "required": ["address", "functionName"]
        }),
    );

    let err = ToolRegistry::builder().register(broken).build().unwrap_err();

    match err {
        ConfigError::InvalidToolSchema { name, errors } => {
            assert_eq!(name, "read_contract");
            assert!(errors.contains("functionName"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn array_property_without_items_is_rejected() {
    let broken = StubTool::returning("write_contract", serde_json::json!(null)).with_schema(
        serde_json::json!({
            "type": "object",
            "properties": {"args": {"type": "array"}}
        }),
    );

    assert!(matches!(
        ToolRegistry::builder().register(broken).build(),
        Err(ConfigError::InvalidToolSchema { .. })
    ));
}
