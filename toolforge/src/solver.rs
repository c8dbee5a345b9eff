//! Task solving with registered tools.
//!
//! The model is shown the task and the tool listing and answers with a plan:
//! a solution description plus an ordered list of tool calls. Each call is
//! bound against the tool's declared parameters and run in the sandbox.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::flexible::{bind, CallArguments};
use crate::gateway::extract::fenced_blocks;
use crate::gateway::{GatewayError, ModelGateway};
use crate::registry::ToolRegistry;
use crate::sandbox::{Outcome, SandboxError, SandboxExecutor};

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("task is empty")]
    EmptyTask,
    #[error("plan request failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("unusable plan: {0}")]
    Plan(String),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// One tool call proposed by the model. `args` is a list in parameter order,
/// a mapping by parameter name, or a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionPlan {
    pub solution: String,
    #[serde(default)]
    pub tools_used: Vec<PlannedCall>,
}

/// Parse a plan from a model response: ```yaml blocks first, then the
/// whole text. JSON plans parse too.
pub fn parse_plan(text: &str) -> Result<SolutionPlan, SolveError> {
    let blocks = fenced_blocks(text);
    let fenced = blocks
        .iter()
        .filter(|b| matches!(b.lang.as_str(), "yaml" | "yml" | "json" | ""))
        .map(|b| b.body.as_str());

    let mut last_error = String::from("empty response");
    for candidate in fenced.chain(std::iter::once(text)) {
        match serde_yaml::from_str::<SolutionPlan>(candidate) {
            Ok(plan) => return Ok(plan),
            Err(err) => last_error = err.to_string(),
        }
    }
    Err(SolveError::Plan(last_error))
}

/// What happened to one planned call. A call that could not be matched to a
/// tool or bound to its parameters carries `error` and no outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub tool: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    fn rejected(call: PlannedCall, error: impl ToString) -> Self {
        Self {
            tool: call.name,
            args: call.args,
            outcome: None,
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().map_or(false, |o| o.success)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    pub task: String,
    pub solution: String,
    pub steps: Vec<StepResult>,
}

impl SolveReport {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(StepResult::succeeded)
    }
}

pub struct ToolSolver {
    gateway: ModelGateway,
    executor: SandboxExecutor,
}

impl ToolSolver {
    pub fn new(gateway: ModelGateway, executor: SandboxExecutor) -> Self {
        Self { gateway, executor }
    }

    /// Ask the model for a plan without running anything.
    pub async fn plan(&self, registry: &ToolRegistry, task: &str) -> Result<SolutionPlan, SolveError> {
        if task.trim().is_empty() {
            return Err(SolveError::EmptyTask);
        }
        let text = self.gateway.request_plan(task, &registry.summaries()).await?;
        let plan = parse_plan(&text)?;
        tracing::info!(steps = plan.tools_used.len(), "plan received");
        Ok(plan)
    }

    /// Plan, then run every call in order. Step failures are recorded in the
    /// report; only gateway, plan and sandbox infrastructure errors abort.
    pub async fn solve(&self, registry: &ToolRegistry, task: &str) -> Result<SolveReport, SolveError> {
        let plan = self.plan(registry, task).await?;
        let mut steps = Vec::with_capacity(plan.tools_used.len());
        for call in plan.tools_used {
            steps.push(self.run_step(registry, call).await?);
        }
        Ok(SolveReport {
            task: task.trim().to_string(),
            solution: plan.solution.trim().to_string(),
            steps,
        })
    }

    async fn run_step(&self, registry: &ToolRegistry, call: PlannedCall) -> Result<StepResult, SandboxError> {
        let tool = match registry.lookup(&call.name) {
            Ok(tool) => tool,
            Err(err) => {
                tracing::warn!(tool = %call.name, "plan names an unregistered tool");
                return Ok(StepResult::rejected(call, err));
            }
        };
        let args = match &call.args {
            Value::Null => CallArguments::default(),
            other => CallArguments::from_value(other.clone(), &tool.parameters),
        };
        let values = match bind(&tool.parameters, args) {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "plan arguments rejected");
                return Ok(StepResult::rejected(call, err));
            }
        };

        let outcome = self.executor.execute(&tool.source, &tool.name, &values).await?;
        tracing::info!(
            tool = %tool.name,
            success = outcome.success,
            elapsed_ms = outcome.elapsed_ms,
            "plan step executed"
        );
        Ok(StepResult {
            tool: call.name,
            args: Value::Array(values),
            outcome: Some(outcome),
            error: None,
        })
    }
}
