#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use toolforge::gateway::{ModelGateway, StubLlmProvider};
use toolforge::orchestrator::{CycleOrchestrator, OrchestratorSettings};
use toolforge::reflection::{ReflectionHistory, ReflectionRecord};
use toolforge::registry::{ToolRecord, ToolRegistry};
use toolforge::sandbox::{SandboxExecutor, ScriptedRuntime};
use toolforge::storage::InMemoryStore;
use toolforge::synthesis::ToolValidator;

pub const ADD: &str = "def add(a: int, b: int) -> int:\n    \"\"\"Add two integers.\"\"\"\n    return a + b\n";
pub const PLUS: &str = "def plus(a: int, b: int) -> int:\n    \"\"\"Add two integers.\"\"\"\n    return a + b\n";
pub const AVERAGE_BROKEN: &str =
    "def average(numbers: list[float]) -> float:\n    return sum(numbers) / len(numbers)\n";
pub const AVERAGE_FIXED: &str = "def average(numbers: list[float]) -> float:\n    if not numbers:\n        return 0.0\n    return sum(numbers) / len(numbers)\n";

/// Runtime that knows every candidate used by the cycle tests.
pub fn scripted_runtime() -> ScriptedRuntime {
    ScriptedRuntime::new()
        .with_candidate(ADD, "add", int_sum)
        .with_candidate(PLUS, "plus", int_sum)
        .with_candidate(AVERAGE_BROKEN, "average", |args| {
            let xs = floats(&args[0]);
            if xs.is_empty() {
                return Err("ZeroDivisionError: division by zero".to_string());
            }
            Ok(json!(xs.iter().sum::<f64>() / xs.len() as f64))
        })
        .with_candidate(AVERAGE_FIXED, "average", |args| {
            let xs = floats(&args[0]);
            if xs.is_empty() {
                return Ok(json!(0.0));
            }
            Ok(json!(xs.iter().sum::<f64>() / xs.len() as f64))
        })
}

fn int_sum(args: &[Value]) -> Result<Value, String> {
    let a = args[0].as_i64().ok_or("TypeError: a")?;
    let b = args[1].as_i64().ok_or("TypeError: b")?;
    Ok(json!(a + b))
}

fn floats(value: &Value) -> Vec<f64> {
    value
        .as_array()
        .map(|xs| xs.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

pub fn reflection(name: &str, purpose: &str) -> String {
    json!({
        "strengths": ["small"],
        "weaknesses": ["few tools"],
        "missing_capabilities": [purpose],
        "improvement_priority": "high",
        "next_tool_recommendation": {
            "name": name,
            "purpose": purpose,
            "category": "math",
            "implementation_notes": "handle empty input"
        },
        "internal_monologue": "keep going"
    })
    .to_string()
}

pub fn fenced(source: &str) -> String {
    format!("Here you go:\n```python\n{}```\n", source)
}

/// No pauses, no seeds, no docs, no periodic summary.
pub fn quiet_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        max_repair_attempts: 3,
        similarity_threshold: Some(0.8),
        summary_interval: 0,
        delay_after_success: Duration::ZERO,
        delay_after_failure: Duration::ZERO,
        seed_tools: false,
        docs_path: None,
    }
}

pub struct Harness {
    pub stub: Arc<StubLlmProvider>,
    pub tools: Arc<InMemoryStore<ToolRecord>>,
    pub reflections: Arc<InMemoryStore<ReflectionRecord>>,
    pub orchestrator: CycleOrchestrator,
}

pub fn harness(runtime: ScriptedRuntime, settings: OrchestratorSettings) -> Harness {
    let stub = Arc::new(StubLlmProvider::new());
    let tools = Arc::new(InMemoryStore::<ToolRecord>::new());
    let reflections = Arc::new(InMemoryStore::<ReflectionRecord>::new());

    let registry = ToolRegistry::open(Box::new(tools.clone())).expect("registry");
    let history = ReflectionHistory::open(Box::new(reflections.clone())).expect("history");
    let gateway = ModelGateway::new(stub.clone(), 1024);
    let validator = ToolValidator::new(SandboxExecutor::new(
        Arc::new(runtime),
        Duration::from_secs(5),
    ));

    let orchestrator = CycleOrchestrator::new(registry, history, gateway, validator, settings);
    Harness {
        stub,
        tools,
        reflections,
        orchestrator,
    }
}
