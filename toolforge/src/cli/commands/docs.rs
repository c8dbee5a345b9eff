//! Docs command - regenerate the Markdown documentation

use crate::cli::{CliContext, OutputFormatter};
use crate::docs;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct DocsArgs {
    /// Output path (defaults to the configured docs file)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn execute(ctx: &CliContext, args: DocsArgs) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let registry = ctx.open_registry()?;
    let path = args.output.unwrap_or_else(|| ctx.config.storage.docs_path());

    docs::export(&registry.all(), &path)
        .with_context(|| format!("writing {}", path.display()))?;

    if formatter.is_json() {
        formatter.json(&serde_json::json!({
            "path": path,
            "tools": registry.len(),
        }));
    } else {
        formatter.success(&format!(
            "Documented {} tool(s) in {}",
            registry.len(),
            path.display()
        ));
    }
    Ok(())
}
