//! Reflections command - show the reflection history

use crate::cli::{CliContext, OutputFormat, OutputFormatter};
use clap::Args;

#[derive(Debug, Args)]
pub struct ReflectionsArgs {
    /// Only the most recent N reflections
    #[arg(short, long)]
    pub last: Option<usize>,
}

pub async fn execute(ctx: &CliContext, args: ReflectionsArgs) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let history = ctx.open_history()?;
    let records = match args.last {
        Some(n) => history.recent(n),
        None => history.all(),
    };

    match ctx.output_format {
        OutputFormat::Json => formatter.json(&records),
        _ if records.is_empty() => ctx.status("No reflections recorded"),
        _ => {
            for record in records {
                let rec = &record.next_tool_recommendation;
                formatter.section(&format!(
                    "{} -> {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    rec.name
                ));
                formatter.kv("Purpose", &rec.purpose);
                formatter.kv("Category", &rec.category);
                if !record.improvement_priority.is_empty() {
                    formatter.kv("Priority", &record.improvement_priority);
                }
                for gap in &record.missing_capabilities {
                    formatter.list_item(gap);
                }
            }
            ctx.status(&format!("\n{} of {} reflection(s)", records.len(), history.len()));
        }
    }
    Ok(())
}
