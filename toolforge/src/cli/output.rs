//! Output formatting for CLI commands

use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, coloured tables (default)
    #[default]
    Table,
    /// JSON documents
    Json,
    /// Plain text without colour
    Plain,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Plain => write!(f, "plain"),
        }
    }
}

/// Output formatter for consistent CLI output
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn status(&self, status: &str, symbol: colored::ColoredString, message: &str, to_stderr: bool) {
        let line = match self.format {
            OutputFormat::Json => serde_json::json!({"status": status, "message": message}).to_string(),
            OutputFormat::Table => format!("{} {}", symbol, message),
            OutputFormat::Plain => format!("{}: {}", status, message),
        };
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    pub fn success(&self, message: &str) {
        self.status("success", "✓".green(), message, false);
    }

    pub fn error(&self, message: &str) {
        self.status("error", "✗".red(), message, true);
    }

    pub fn warning(&self, message: &str) {
        self.status("warning", "⚠".yellow(), message, true);
    }

    /// Print data as pretty JSON
    pub fn json<T: Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(json) => println!("{}", json),
            Err(e) => self.error(&format!("Failed to serialize to JSON: {}", e)),
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::json!({key: value})),
            OutputFormat::Table => println!("{}: {}", key.cyan(), value),
            OutputFormat::Plain => println!("{}: {}", key, value),
        }
    }

    pub fn section(&self, title: &str) {
        match self.format {
            OutputFormat::Table => println!("\n{}\n", title.bold().underline()),
            OutputFormat::Plain => println!("\n{}\n", title),
            OutputFormat::Json => {}
        }
    }

    pub fn list_item(&self, item: &str) {
        match self.format {
            OutputFormat::Table => println!("  {} {}", "•".cyan(), item),
            _ => println!("  - {}", item),
        }
    }

    /// Print rows under a header with columns padded to the widest cell.
    /// Plain output is tab-separated; JSON output prints nothing here.
    pub fn table(&self, columns: &[&str], rows: &[Vec<String>]) {
        match self.format {
            OutputFormat::Json => {}
            OutputFormat::Plain => {
                println!("{}", columns.join("\t"));
                for row in rows {
                    println!("{}", row.join("\t"));
                }
            }
            OutputFormat::Table => {
                let widths: Vec<usize> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        rows.iter()
                            .filter_map(|r| r.get(i))
                            .map(|cell| cell.chars().count())
                            .chain(std::iter::once(c.len()))
                            .max()
                            .unwrap_or(0)
                    })
                    .collect();
                let header: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| format!("{:<width$}", c, width = *w).bold().to_string())
                    .collect();
                println!("{}", header.join("  "));
                println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
                for row in rows {
                    let cells: Vec<String> = row
                        .iter()
                        .zip(&widths)
                        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
                        .collect();
                    println!("{}", cells.join("  ").trim_end());
                }
            }
        }
    }
}
