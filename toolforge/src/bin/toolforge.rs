//! Toolforge CLI
//!
//! # Usage
//!
//! ```bash
//! # Run three cycles, then stop
//! toolforge run --cycles 3
//!
//! # Inspect and call registered tools
//! toolforge tools list
//! toolforge tools show reverse_string
//! toolforge tools call calculate_sum '[1, 2, 3.5]'
//!
//! # Plan a task with the registered tools and run the plan
//! toolforge solve "reverse 'hello' and count its vowels"
//!
//! # Validate a local candidate
//! toolforge validate word_count.py
//!
//! # Configuration
//! toolforge config init
//! toolforge config validate
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use toolforge::cli::commands::{
    config::ConfigCommand, docs::DocsArgs, reflections::ReflectionsArgs, run::RunArgs,
    solve::SolveArgs, tools::ToolsCommand, validate::ValidateArgs,
};
use toolforge::cli::{commands, CliContext, OutputFormat};
use toolforge::logging;

#[derive(Parser)]
#[command(name = "toolforge")]
#[command(version)]
#[command(about = "Toolforge - self-extending tool synthesis", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", env = "TOOLFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output_format: OutputFormat,

    /// Suppress status messages
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reflect/implement/validate cycles
    Run(RunArgs),

    /// Registered tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },

    /// Validate a local candidate file
    Validate(ValidateArgs),

    /// Reflection history
    Reflections(ReflectionsArgs),

    /// Export tool documentation
    Docs(DocsArgs),

    /// Capability summary from the model
    Summary,

    /// Solve a task with the registered tools
    Solve(SolveArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut ctx = match cli.config {
        Some(path) => CliContext::new(path),
        None => CliContext::with_defaults(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Error loading configuration: {}", e);
        std::process::exit(1);
    });
    ctx.output_format = cli.output_format;
    ctx.quiet = cli.quiet;
    ctx.verbose = cli.verbose;

    // Only long-running cycles write the log file.
    let mut log_settings = ctx.config.logging.clone();
    if !matches!(cli.command, Commands::Run(_)) {
        log_settings.file = None;
    }
    if let Err(e) = logging::init(&log_settings, cli.verbose) {
        eprintln!("Warning: logging not initialized: {}", e);
    }

    let result = match cli.command {
        Commands::Run(args) => {
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received; finishing current cycle");
                    let _ = tx.send(true);
                }
            });
            commands::run::execute(&ctx, args, rx).await
        }
        Commands::Tools { command } => commands::tools::execute(&ctx, command).await,
        Commands::Validate(args) => commands::validate::execute(&ctx, args).await,
        Commands::Reflections(args) => commands::reflections::execute(&ctx, args).await,
        Commands::Docs(args) => commands::docs::execute(&ctx, args).await,
        Commands::Summary => commands::summary::execute(&ctx).await,
        Commands::Solve(args) => commands::solve::execute(&ctx, args).await,
        Commands::Config { command } => commands::config::execute(&ctx, command).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommand_flags_parse_alongside_global_flags() {
        let cli = Cli::try_parse_from([
            "toolforge", "-c", "forge.toml", "-o", "json", "tools", "list", "--category", "math",
        ])
        .unwrap();
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Tools {
                command: ToolsCommand::List { category: Some(ref c) }
            } if c == "math"
        ));

        let cli = Cli::try_parse_from(["toolforge", "config", "init", "--output", "x.toml", "-f"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommand::Init { ref output, force: true }
            } if output == "x.toml"
        ));

        let cli = Cli::try_parse_from(["toolforge", "docs", "--output", "out.md", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Docs(DocsArgs { output: Some(_) })));

        let cli = Cli::try_parse_from(["toolforge", "solve", "reverse", "hello", "--dry-run", "-o", "json"])
            .unwrap();
        assert_eq!(cli.output_format, OutputFormat::Json);
        match cli.command {
            Commands::Solve(args) => {
                assert_eq!(args.task, vec!["reverse", "hello"]);
                assert!(args.dry_run);
            }
            _ => panic!("expected solve"),
        }
    }
}
