//! Solve command - let the model plan a task with registered tools, then run the plan

use crate::cli::{CliContext, OutputFormatter};
use crate::solver::ToolSolver;
use anyhow::bail;
use clap::Args;

#[derive(Debug, Args)]
pub struct SolveArgs {
    /// Task description
    #[arg(required = true, num_args = 1..)]
    pub task: Vec<String>,

    /// Print the plan without running any tool
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(ctx: &CliContext, args: SolveArgs) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let registry = ctx.open_registry()?;
    let task = args.task.join(" ");
    if registry.is_empty() {
        ctx.status("No tools registered; the plan can only describe a solution");
    }

    let solver = ToolSolver::new(ctx.gateway()?, ctx.executor());
    ctx.debug(&format!("planning with {} tools", registry.len()));

    if args.dry_run {
        let plan = solver.plan(&registry, &task).await?;
        if formatter.is_json() {
            formatter.json(&plan);
            return Ok(());
        }
        formatter.section("Solution");
        println!("{}", plan.solution.trim());
        formatter.section(&format!("Planned calls ({})", plan.tools_used.len()));
        for call in &plan.tools_used {
            formatter.list_item(&format!("{}({})", call.name, call.args));
        }
        return Ok(());
    }

    let report = solver.solve(&registry, &task).await?;
    if formatter.is_json() {
        formatter.json(&report);
    } else {
        formatter.section("Solution");
        println!("{}", report.solution);
        formatter.section(&format!("Steps ({})", report.steps.len()));
        for (index, step) in report.steps.iter().enumerate() {
            let result = match (&step.outcome, &step.error) {
                (Some(outcome), _) if outcome.success => outcome
                    .value
                    .as_ref()
                    .map_or_else(|| "null".to_string(), |v| v.to_string()),
                (Some(outcome), _) => outcome.describe(),
                (None, Some(error)) => error.clone(),
                (None, None) => String::new(),
            };
            formatter.kv(&format!("{}. {}({})", index + 1, step.tool, step.args), &result);
        }
    }
    if !report.all_succeeded() {
        bail!("some planned calls did not succeed");
    }
    Ok(())
}
