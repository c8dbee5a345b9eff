mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use toolforge::gateway::{ModelGateway, RequestKind, StubLlmProvider};
use toolforge::orchestrator::CycleOrchestrator;
use toolforge::reflection::{ReflectionHistory, ReflectionRecord};
use toolforge::registry::{RegistryError, ToolRecord, ToolRegistry};
use toolforge::sandbox::SandboxExecutor;
use toolforge::storage::{JsonFileStore, StoreError};
use toolforge::synthesis::ToolValidator;

fn open_registry(path: &std::path::Path) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::open(Box::new(JsonFileStore::<ToolRecord>::new(path)))
}

fn open_history(path: &std::path::Path) -> Result<ReflectionHistory, StoreError> {
    ReflectionHistory::open(Box::new(JsonFileStore::<ReflectionRecord>::new(path)))
}

#[tokio::test]
async fn integrated_tools_survive_a_restart_and_docs_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let tools_path = dir.path().join("tools.json");
    let reflections_path = dir.path().join("reflections.json");
    let docs_path = dir.path().join("tools_documentation.md");

    let stub = Arc::new(StubLlmProvider::new());
    stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    stub.push(RequestKind::Implementation, fenced(ADD));

    let mut settings = quiet_settings();
    settings.docs_path = Some(docs_path.clone());
    let mut orchestrator = CycleOrchestrator::new(
        open_registry(&tools_path).unwrap(),
        open_history(&reflections_path).unwrap(),
        ModelGateway::new(stub, 512),
        ToolValidator::new(SandboxExecutor::new(
            Arc::new(scripted_runtime()),
            Duration::from_secs(5),
        )),
        settings,
    );
    assert!(orchestrator.run_cycle().await.is_integrated());
    orchestrator.flush().unwrap();
    drop(orchestrator);

    let registry = open_registry(&tools_path).unwrap();
    assert_eq!(registry.len(), 1);
    let tool = registry.lookup("add").unwrap();
    assert_eq!(tool.source, ADD);
    assert_eq!(tool.signature(), "add(a: int, b: int) -> int");

    let history = open_history(&reflections_path).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.all()[0].next_tool_recommendation.name, "add");

    let docs = std::fs::read_to_string(&docs_path).unwrap();
    assert!(docs.starts_with("# Toolforge Tools Documentation"));
    assert!(docs.contains("Total tools: 1"));
    assert!(docs.contains("## math"));
    assert!(docs.contains("### add"));
}

#[test]
fn missing_store_file_means_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(&dir.path().join("absent.json")).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn corrupt_store_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tools.json");
    std::fs::write(&path, "{ not json").unwrap();

    match open_registry(&path) {
        Err(RegistryError::Store(StoreError::Corrupt { .. })) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("corrupt store opened"),
    }
    assert!(open_history(&path).is_err());
}

#[test]
fn registering_an_existing_name_is_rejected_and_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tools.json");
    let mut registry = open_registry(&path).unwrap();
    let template: ToolRecord = serde_json::from_value(serde_json::json!({
        "name": "add",
        "category": "math",
        "purpose": "Add two integers",
        "parameters": [
            {"name": "a", "declared_type": "integer"},
            {"name": "b", "declared_type": "integer"}
        ],
        "return_type": "integer",
        "source": ADD,
        "documentation": "Add two integers.",
        "created_at": "2024-01-01T00:00:00Z"
    }))
    .unwrap();

    registry.register(template.clone()).unwrap();
    let mut second = template;
    second.purpose = "Another adder".to_string();
    match registry.register(second) {
        Err(RegistryError::DuplicateName(name)) => assert_eq!(name, "add"),
        other => panic!("expected duplicate error, got {:?}", other.map(|_| ())),
    }

    let reopened = open_registry(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.lookup("add").unwrap().purpose, "Add two integers");
}
