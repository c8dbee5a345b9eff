//! Config command - configuration management

use crate::cli::{CliContext, OutputFormatter};
use crate::config::{ForgeConfig, CONFIG_TEMPLATE, DEFAULT_CONFIG_FILE};
use anyhow::{bail, Context};
use clap::Subcommand;
use serde::Serialize;
use std::path::Path;

const SECTIONS: &[&str] = &["llm", "cycle", "sandbox", "storage", "logging"];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Show only one section (llm, cycle, sandbox, storage, logging)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration and credentials
    Validate,

    /// Write a commented configuration template
    Init {
        /// Output path for the configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        output: String,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn execute(ctx: &CliContext, command: ConfigCommand) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);

    match command {
        ConfigCommand::Show { section } => show(ctx, section.as_deref(), &formatter),
        ConfigCommand::Validate => validate(ctx, &formatter),
        ConfigCommand::Init { output, force } => init(Path::new(&output), force, &formatter),
    }
}

fn show(ctx: &CliContext, section: Option<&str>, formatter: &OutputFormatter) -> anyhow::Result<()> {
    if let Some(name) = section {
        if !SECTIONS.contains(&name) {
            formatter.list_item(&format!("Available sections: {}", SECTIONS.join(", ")));
            bail!("unknown section: {}", name);
        }
    }
    let config = &ctx.config;

    if formatter.is_json() {
        match section {
            Some(name) => formatter.json(&section_value(config, name)?),
            None => formatter.json(config),
        }
        return Ok(());
    }

    let wanted = |name: &str| section.map_or(true, |s| s == name);
    formatter.kv("Config file", &ctx.config_path.display().to_string());
    if !ctx.config_path.exists() {
        formatter.warning("file not found; showing defaults");
    }

    if wanted("llm") {
        formatter.section("LLM");
        formatter.kv("Provider", &config.llm.provider);
        formatter.kv("Model", &config.llm.model);
        formatter.kv("API key env", &config.llm.api_key_env);
        formatter.kv(
            "API key",
            if config.api_key().is_some() { "set" } else { "not set" },
        );
        formatter.kv("Base URL", config.llm.base_url.as_deref().unwrap_or("(provider default)"));
        formatter.kv("Max tokens", &config.llm.max_tokens.to_string());
        formatter.kv("Timeout", &format!("{}s", config.llm.timeout_secs));
    }
    if wanted("cycle") {
        let cycle = &config.cycle;
        formatter.section("Cycle");
        formatter.kv("Max repair attempts", &cycle.max_repair_attempts.to_string());
        formatter.kv(
            "Max cycles",
            &match cycle.max_cycles {
                0 => "unbounded".to_string(),
                n => n.to_string(),
            },
        );
        formatter.kv(
            "Delays",
            &format!(
                "{}s after success, {}s after failure",
                cycle.delay_after_success_secs, cycle.delay_after_failure_secs
            ),
        );
        formatter.kv(
            "Similarity threshold",
            &cycle
                .similarity_threshold
                .map_or_else(|| "disabled".to_string(), |t| t.to_string()),
        );
        formatter.kv("Summary interval", &cycle.summary_interval.to_string());
        formatter.kv("Seed tools", &cycle.seed_tools.to_string());
    }
    if wanted("sandbox") {
        formatter.section("Sandbox");
        formatter.kv("Python", &config.sandbox.python);
        formatter.kv("Timeout", &format!("{} ms", config.sandbox.timeout_ms));
    }
    if wanted("storage") {
        formatter.section("Storage");
        formatter.kv("Tools", &config.storage.tools_path().display().to_string());
        formatter.kv("Reflections", &config.storage.reflections_path().display().to_string());
        formatter.kv("Documentation", &config.storage.docs_path().display().to_string());
    }
    if wanted("logging") {
        formatter.section("Logging");
        formatter.kv("Level", &config.logging.level);
        formatter.kv(
            "File",
            &config
                .logging
                .file
                .as_ref()
                .map_or_else(|| "(stderr only)".to_string(), |p| p.display().to_string()),
        );
    }
    Ok(())
}

fn section_value(config: &ForgeConfig, name: &str) -> anyhow::Result<serde_json::Value> {
    fn to_value<T: Serialize>(v: &T) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(v)?)
    }
    match name {
        "llm" => to_value(&config.llm),
        "cycle" => to_value(&config.cycle),
        "sandbox" => to_value(&config.sandbox),
        "storage" => to_value(&config.storage),
        "logging" => to_value(&config.logging),
        other => bail!("unknown section: {}", other),
    }
}

fn validate(ctx: &CliContext, formatter: &OutputFormatter) -> anyhow::Result<()> {
    match ctx.validate_config() {
        Ok(warnings) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "valid": true, "warnings": warnings }));
                return Ok(());
            }
            for warning in &warnings {
                formatter.warning(warning);
            }
            formatter.success(&format!(
                "Configuration is valid ({} warning(s))",
                warnings.len()
            ));
            Ok(())
        }
        Err(err) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "valid": false, "error": err.to_string() }));
            }
            Err(err.into())
        }
    }
}

fn init(output: &Path, force: bool, formatter: &OutputFormatter) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(output, CONFIG_TEMPLATE)
        .with_context(|| format!("writing {}", output.display()))?;

    formatter.success(&format!("Created {}", output.display()));
    formatter.list_item("Set the API key variable named by llm.api_key_env");
    formatter.list_item("Run `toolforge config validate` to check it");
    Ok(())
}
