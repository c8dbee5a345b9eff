//! Validate command - run a local candidate through the validator

use crate::cli::{CliContext, OutputFormatter};
use crate::sandbox::PythonRuntime;
use crate::synthesis::{normalize_annotations, ToolValidator};
use anyhow::{anyhow, Context};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Python file defining the candidate function
    pub file: PathBuf,

    /// Entry function name (defaults to the file stem)
    #[arg(short, long)]
    pub name: Option<String>,
}

pub async fn execute(ctx: &CliContext, args: ValidateArgs) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);

    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let name = match args.name {
        Some(name) => name,
        None => args
            .file
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot derive a function name from {}", args.file.display()))?,
    };
    let source = normalize_annotations(&raw);

    let version = PythonRuntime::new(&ctx.config.sandbox.python).probe().await?;
    ctx.debug(&format!("sandbox: {}", version));

    let validator = ToolValidator::new(ctx.executor());
    let verdict = validator.validate(&source, &name).await?;

    if formatter.is_json() {
        formatter.json(&verdict);
        return Ok(());
    }

    if let Some(signature) = &verdict.signature {
        formatter.kv("Signature", &signature.render());
    }
    let rows: Vec<Vec<String>> = verdict
        .cases
        .iter()
        .map(|case| {
            let inputs = serde_json::Value::Array(case.inputs.clone()).to_string();
            let result = if case.outcome.success {
                case.outcome
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            } else {
                case.outcome.describe()
            };
            vec![inputs, result, format!("{} ms", case.outcome.elapsed_ms)]
        })
        .collect();
    if !rows.is_empty() {
        formatter.table(&["Inputs", "Result", "Elapsed"], &rows);
        println!();
    }

    if verdict.passed {
        formatter.success(&format!("{} passed {} input(s)", name, verdict.cases.len()));
        Ok(())
    } else {
        let diagnostic = verdict.diagnostic.unwrap_or_default();
        formatter.error(&format!("{} failed validation", name));
        Err(anyhow!(diagnostic))
    }
}
