//! Run command - drive reflect/implement/validate cycles

use crate::cli::{CliContext, OutputFormatter};
use crate::orchestrator::{CycleOrchestrator, CycleReport};
use clap::Args;
use tokio::sync::watch;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Number of cycles to run (0 runs until interrupted)
    #[arg(short = 'n', long)]
    pub cycles: Option<u64>,

    /// Validation attempts per recommended tool
    #[arg(long)]
    pub max_repair_attempts: Option<u32>,

    /// Pause between cycles, in seconds, after both success and failure
    #[arg(long)]
    pub delay_secs: Option<u64>,
}

pub async fn execute(
    ctx: &CliContext,
    args: RunArgs,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);

    let mut config = ctx.config.clone();
    if let Some(n) = args.max_repair_attempts {
        config.cycle.max_repair_attempts = n;
    }
    if let Some(secs) = args.delay_secs {
        config.cycle.delay_after_success_secs = secs;
        config.cycle.delay_after_failure_secs = secs;
    }
    let cycles = args.cycles.unwrap_or(config.cycle.max_cycles);
    let max_cycles = (cycles > 0).then_some(cycles);

    ctx.debug(&format!("provider: {} ({})", config.llm.provider, config.llm.model));
    let mut orchestrator = CycleOrchestrator::from_config(&config).await?;
    orchestrator.bootstrap().await?;
    ctx.status(&format!(
        "Starting with {} registered tools",
        orchestrator.registry().len()
    ));

    let summary = orchestrator.run(max_cycles, shutdown).await;
    orchestrator.flush()?;

    if formatter.is_json() {
        formatter.json(&summary);
        return Ok(());
    }

    formatter.section("Run Summary");
    let rows: Vec<Vec<String>> = summary
        .reports
        .iter()
        .enumerate()
        .map(|(i, report)| {
            let (result, detail) = match report {
                CycleReport::Integrated { name, attempts } => {
                    ("integrated", format!("{} ({} attempt(s))", name, attempts))
                }
                CycleReport::Rejected { name, attempts, .. } => {
                    ("rejected", format!("{} ({} attempt(s))", name, attempts))
                }
                CycleReport::Skipped { stage, reason } => {
                    ("skipped", format!("{}: {}", stage, reason))
                }
            };
            vec![(i + 1).to_string(), result.to_string(), detail]
        })
        .collect();
    formatter.table(&["Cycle", "Result", "Detail"], &rows);
    println!();
    formatter.kv("Integrated", &summary.integrated.to_string());
    formatter.kv("Rejected", &summary.rejected.to_string());
    formatter.kv("Skipped", &summary.skipped.to_string());
    formatter.kv("Registered tools", &orchestrator.registry().len().to_string());
    if summary.interrupted {
        formatter.warning("Interrupted; state flushed");
    }
    Ok(())
}
