//! Tests for the tool system: parameter schemas, arguments, registry.

use std::sync::Arc;

use palaver::error::PalaverError;
use palaver::tools::tool::{FnTool, Tool, ToolExecutionContext};
use palaver::tools::{ToolArguments, ToolParameters, ToolRegistry};

fn greet_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "greet",
        "Greet a person",
        ToolParameters::object().string("name", "Name", true).build(),
        |args, _ctx| async move {
            let name = args.get_str("name")?;
            Ok(serde_json::json!({"greeting": format!("Hello, {}!", name)}))
        },
    ))
}

fn failing_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "explode",
        "Always fails",
        ToolParameters::empty(),
        |_args, _ctx| async move {
            Err::<serde_json::Value, _>(PalaverError::InvalidArgument("boom".to_string()))
        },
    ))
}

#[test]
fn parameter_builder_constructs_schema() {
    let params = ToolParameters::object()
        .string("query", "Search query", true)
        .number("limit", "Max results", false)
        .boolean("verbose", "Enable verbose output", false)
        .build();

    let schema = &params.schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["query"]["type"], "string");
    assert_eq!(schema["properties"]["limit"]["type"], "number");
    assert_eq!(schema["required"].as_array().unwrap().len(), 1);
}

#[test]
fn empty_parameters() {
    let params = ToolParameters::empty();
    assert_eq!(params.schema["type"], "object");
}

#[test]
fn tool_arguments_accessors() {
    let args = ToolArguments::new(serde_json::json!({
        "name": "Alice", "age": 30, "active": true
    }));
    assert_eq!(args.get_str("name").unwrap(), "Alice");
    assert!(args.get_str("missing").is_err());
    assert_eq!(args.get_i64("age").unwrap(), 30);
    assert!(args.get_bool("active").unwrap());
    assert_eq!(args.get_str_opt("name"), Some("Alice"));
    assert_eq!(args.get_str_opt("missing"), None);
}

#[test]
fn tool_arguments_deserialize() {
    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Params {
        query: String,
        limit: Option<u32>,
    }

    let args = ToolArguments::new(serde_json::json!({"query": "rust", "limit": 10}));
    let params: Params = args.deserialize().unwrap();
    assert_eq!(params.query, "rust");
    assert_eq!(params.limit, Some(10));
}

#[tokio::test]
async fn fn_tool_executes() {
    let tool = greet_tool();
    assert_eq!(tool.name(), "greet");

    let args = ToolArguments::new(serde_json::json!({"name": "World"}));
    let result = tool
        .execute(&args, &ToolExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result["greeting"], "Hello, World!");
}

#[test]
fn registry_rejects_duplicate_names() {
    let registry = ToolRegistry::new();
    registry.register(greet_tool()).unwrap();

    let err = registry.register(greet_tool()).expect_err("duplicate should fail");
    assert!(matches!(err, PalaverError::DuplicateTool(name) if name == "greet"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn registry_definitions_keep_registration_order() {
    let registry = ToolRegistry::new();
    registry.register(failing_tool()).unwrap();
    registry.register(greet_tool()).unwrap();

    let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, vec!["explode".to_string(), "greet".to_string()]);

    // Stable across repeated reads.
    let again: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, again);
}

#[tokio::test]
async fn registry_invoke_unknown_tool() {
    let registry = ToolRegistry::new();
    let err = registry
        .invoke("nope", serde_json::json!({}), ToolExecutionContext::default())
        .await
        .expect_err("unknown tool should fail");
    assert!(matches!(err, PalaverError::UnknownTool(name) if name == "nope"));
}

#[tokio::test]
async fn registry_wraps_execution_faults() {
    let registry = ToolRegistry::new();
    registry.register(failing_tool()).unwrap();

    let err = registry
        .invoke("explode", serde_json::json!({}), ToolExecutionContext::default())
        .await
        .expect_err("failing tool should fail");
    match err {
        PalaverError::ToolExecution { tool_name, message } => {
            assert_eq!(tool_name, "explode");
            assert!(message.contains("boom"));
        }
        other => panic!("expected tool execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn registry_returns_result_unchanged() {
    let registry = ToolRegistry::new();
    registry.register(greet_tool()).unwrap();

    let result = registry
        .invoke(
            "greet",
            serde_json::json!({"name": "Ada"}),
            ToolExecutionContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!({"greeting": "Hello, Ada!"}));
}
