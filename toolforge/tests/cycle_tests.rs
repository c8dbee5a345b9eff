mod common;

use common::*;
use pretty_assertions::assert_eq;
use tokio::sync::watch;
use toolforge::gateway::RequestKind;
use toolforge::orchestrator::{CycleReport, SEED_TOOLS};
use toolforge::registry::ToolRecord;
use toolforge::sandbox::ScriptedRuntime;
use toolforge::types::TypeTag;

#[tokio::test]
async fn valid_tool_is_integrated_on_first_attempt() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(ADD));

    let report = h.orchestrator.run_cycle().await;

    assert_eq!(
        report,
        CycleReport::Integrated {
            name: "add".to_string(),
            attempts: 1
        }
    );
    let tool = h.orchestrator.registry().lookup("add").unwrap();
    assert_eq!(tool.category, "math");
    assert_eq!(tool.documentation, "Add two integers.");
    assert_eq!(tool.return_type, TypeTag::Integer);
    assert_eq!(tool.test_outcomes.len(), 5);
    assert!(tool.test_outcomes.iter().all(|c| c.outcome.success));
    assert_eq!(h.tools.snapshot().len(), 1);
    assert!(h.stub.requests_of(RequestKind::Repair).is_empty());
}

#[tokio::test]
async fn empty_list_failure_is_repaired() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub
        .push(RequestKind::Reflection, reflection("average", "Mean of numbers"));
    h.stub.push(RequestKind::Implementation, fenced(AVERAGE_BROKEN));
    h.stub.push(RequestKind::Repair, fenced(AVERAGE_FIXED));

    let report = h.orchestrator.run_cycle().await;

    assert_eq!(
        report,
        CycleReport::Integrated {
            name: "average".to_string(),
            attempts: 2
        }
    );
    let repairs = h.stub.requests_of(RequestKind::Repair);
    assert_eq!(repairs.len(), 1);
    assert!(repairs[0].prompt.contains("ZeroDivisionError"));
    assert!(repairs[0].prompt.contains("Failed on input [[]]"));

    let tool = h.orchestrator.registry().lookup("average").unwrap();
    assert_eq!(tool.source, AVERAGE_FIXED);
    assert_eq!(tool.validation_attempts, 2);
    assert_eq!(tool.test_outcomes.len(), 3);
}

#[tokio::test]
async fn always_failing_tool_is_rejected_after_three_attempts() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub
        .push(RequestKind::Reflection, reflection("average", "Mean of numbers"));
    h.stub.push(RequestKind::Implementation, fenced(AVERAGE_BROKEN));
    for _ in 0..5 {
        h.stub.push(RequestKind::Repair, fenced(AVERAGE_BROKEN));
    }

    let report = h.orchestrator.run_cycle().await;

    match report {
        CycleReport::Rejected {
            name,
            attempts,
            diagnostic,
        } => {
            assert_eq!(name, "average");
            assert_eq!(attempts, 3);
            assert!(diagnostic.unwrap().contains("ZeroDivisionError"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(h.stub.requests_of(RequestKind::Repair).len(), 2);
    assert_eq!(h.stub.pending(RequestKind::Repair), 3);
    assert!(h.orchestrator.registry().is_empty());
    assert!(h.tools.snapshot().is_empty());
}

#[tokio::test]
async fn duplicate_recommendation_is_skipped_but_reflection_kept() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(ADD));
    h.stub.push(RequestKind::Reflection, reflection("add", "Add again"));

    assert!(h.orchestrator.run_cycle().await.is_integrated());
    let second = h.orchestrator.run_cycle().await;

    match second {
        CycleReport::Skipped { stage, reason } => {
            assert_eq!(stage, "plan");
            assert!(reason.contains("already registered"));
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert_eq!(h.stub.requests_of(RequestKind::Implementation).len(), 1);
    assert_eq!(h.orchestrator.registry().len(), 1);
    assert_eq!(h.orchestrator.reflection_history().len(), 2);
    assert_eq!(h.reflections.snapshot().len(), 2);
}

#[tokio::test]
async fn malformed_reflection_skips_the_cycle() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub
        .push(RequestKind::Reflection, "I think we should build something nice.");

    let report = h.orchestrator.run_cycle().await;

    match report {
        CycleReport::Skipped { stage, .. } => assert_eq!(stage, "reflect"),
        other => panic!("expected skip, got {:?}", other),
    }
    assert!(h.stub.requests_of(RequestKind::Implementation).is_empty());
    assert!(h.orchestrator.reflection_history().is_empty());
}

#[tokio::test]
async fn gateway_failure_during_implementation_skips_the_cycle() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push_failure(RequestKind::Implementation, "connection reset");

    let report = h.orchestrator.run_cycle().await;

    match report {
        CycleReport::Skipped { stage, reason } => {
            assert_eq!(stage, "implement");
            assert!(reason.contains("connection reset"));
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert_eq!(h.orchestrator.reflection_history().len(), 1);
    assert!(h.orchestrator.registry().is_empty());
}

#[tokio::test]
async fn near_copy_of_existing_tool_is_not_integrated() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(ADD));
    h.stub.push(RequestKind::Reflection, reflection("plus", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(PLUS));

    h.orchestrator.run_cycle().await;
    let report = h.orchestrator.run_cycle().await;

    match report {
        CycleReport::Skipped { stage, reason } => {
            assert_eq!(stage, "integrate");
            assert!(reason.contains("'add'"));
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert!(!h.orchestrator.registry().contains("plus"));
}

#[tokio::test]
async fn similarity_guard_can_be_disabled() {
    let mut settings = quiet_settings();
    settings.similarity_threshold = None;
    let mut h = harness(scripted_runtime(), settings);
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(ADD));
    h.stub.push(RequestKind::Reflection, reflection("plus", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(PLUS));

    h.orchestrator.run_cycle().await;
    assert!(h.orchestrator.run_cycle().await.is_integrated());
    assert_eq!(h.orchestrator.registry().len(), 2);
}

#[tokio::test]
async fn run_stops_after_max_cycles_with_periodic_summary() {
    let mut settings = quiet_settings();
    settings.summary_interval = 2;
    let mut h = harness(scripted_runtime(), settings);
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(ADD));
    h.stub
        .push(RequestKind::Reflection, reflection("average", "Mean of numbers"));
    h.stub.push(RequestKind::Implementation, fenced(AVERAGE_FIXED));
    h.stub.push(RequestKind::Summary, "Arithmetic helpers.");

    let (_tx, rx) = watch::channel(false);
    let summary = h.orchestrator.run(Some(2), rx).await;

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.integrated, 2);
    assert!(!summary.interrupted);
    assert_eq!(h.stub.requests_of(RequestKind::Summary).len(), 1);
    assert_eq!(h.stub.requests_of(RequestKind::Reflection).len(), 2);
    assert_eq!(h.orchestrator.cycles_run(), 2);
}

#[tokio::test]
async fn reflection_prompt_lists_current_tools() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    h.stub.push(RequestKind::Reflection, reflection("add", "Add two integers"));
    h.stub.push(RequestKind::Implementation, fenced(ADD));
    h.stub.push(RequestKind::Reflection, "no json");

    h.orchestrator.run_cycle().await;
    h.orchestrator.run_cycle().await;

    let reflections = h.stub.requests_of(RequestKind::Reflection);
    assert!(reflections[0].prompt.contains("Current tools (0):"));
    assert!(reflections[1].prompt.contains("Current tools (1):"));
    assert!(reflections[1].prompt.contains("add"));
    assert!(reflections.iter().all(|r| (r.temperature - 0.7).abs() < 1e-6));
}

#[tokio::test]
async fn shutdown_before_start_runs_no_cycles() {
    let mut h = harness(scripted_runtime(), quiet_settings());
    let (_tx, rx) = watch::channel(true);

    let summary = h.orchestrator.run(None, rx).await;

    assert_eq!(summary.cycles, 0);
    assert!(summary.interrupted);
    assert!(h.stub.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_the_pause_between_cycles() {
    let mut settings = quiet_settings();
    settings.delay_after_failure = std::time::Duration::from_secs(600);
    let mut h = harness(scripted_runtime(), settings);
    h.stub.push(RequestKind::Reflection, "not a reflection");

    let (tx, rx) = watch::channel(false);
    let run = h.orchestrator.run(None, rx);
    let signal = async {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        tx.send(true).unwrap();
    };
    let (summary, ()) = tokio::join!(run, signal);

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.skipped, 1);
    assert!(summary.interrupted);
}

#[tokio::test]
async fn bootstrap_installs_seed_tools_into_empty_registry() {
    let runtime = SEED_TOOLS.iter().fold(ScriptedRuntime::new(), |rt, seed| {
        match seed.name {
            "reverse_string" => rt.with_candidate(seed.source, seed.name, |args| {
                let text = args[0].as_str().unwrap_or_default();
                Ok(serde_json::json!(text.chars().rev().collect::<String>()))
            }),
            _ => rt.with_candidate(seed.source, seed.name, |args| {
                let total: f64 = args[0]
                    .as_array()
                    .map(|xs| xs.iter().filter_map(|x| x.as_f64()).sum())
                    .unwrap_or(0.0);
                Ok(serde_json::json!(total))
            }),
        }
    });
    let mut settings = quiet_settings();
    settings.seed_tools = true;
    let mut h = harness(runtime, settings);

    h.orchestrator.bootstrap().await.unwrap();

    let names: Vec<String> = h.tools.snapshot().into_iter().map(|t: ToolRecord| t.name).collect();
    assert_eq!(names, vec!["reverse_string", "calculate_sum"]);
    let sum = h.orchestrator.registry().lookup("calculate_sum").unwrap();
    assert_eq!(sum.category, "math");
    assert_eq!(sum.signature(), "calculate_sum(numbers: list[float]) -> float");
}

#[tokio::test]
async fn seed_that_fails_validation_is_skipped() {
    let mut settings = quiet_settings();
    settings.seed_tools = true;
    let mut h = harness(ScriptedRuntime::new(), settings);

    h.orchestrator.bootstrap().await.unwrap();

    assert!(h.orchestrator.registry().is_empty());
}
