//! Summary command - ask the model to describe current capabilities

use crate::cli::{CliContext, OutputFormatter};
pub async fn execute(ctx: &CliContext) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let registry = ctx.open_registry()?;
    if registry.is_empty() {
        ctx.status("No tools registered; nothing to summarize");
        return Ok(());
    }

    let gateway = ctx.gateway()?;
    ctx.debug(&format!("summarizing {} tools", registry.len()));
    let text = gateway.request_summary(&registry.summaries()).await?;

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "tools": registry.len(), "summary": text }));
    } else {
        formatter.section(&format!("Capabilities ({} tools)", registry.len()));
        println!("{}", text.trim());
    }
    Ok(())
}
