//! Toolforge CLI module
//!
//! # Commands
//!
//! - `run` - Run reflect/implement/validate cycles
//! - `tools` - Inspect and call registered tools (list, show, call)
//! - `validate` - Validate a local candidate file
//! - `reflections` - Show the reflection history
//! - `docs` - Export tool documentation
//! - `summary` - Ask the model for a capability summary
//! - `config` - Configuration (show, validate, init)

pub mod commands;
pub mod context;
pub mod output;

pub use context::CliContext;
pub use output::{OutputFormat, OutputFormatter};
