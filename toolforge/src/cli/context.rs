//! CLI context - configuration and services shared by all commands

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ConfigError, ForgeConfig};
use crate::gateway::{provider_from_settings, GatewayError, ModelGateway};
use crate::reflection::{ReflectionHistory, ReflectionRecord};
use crate::registry::{RegistryError, ToolRecord, ToolRegistry};
use crate::sandbox::{PythonRuntime, SandboxExecutor};
use crate::storage::{JsonFileStore, StoreError};

/// Shared context for CLI commands
pub struct CliContext {
    /// Path to the configuration file (may not exist)
    pub config_path: PathBuf,
    /// Loaded configuration with environment overrides applied
    pub config: ForgeConfig,
    pub output_format: super::OutputFormat,
    /// Suppress status messages
    pub quiet: bool,
    /// Extra debug output
    pub verbose: bool,
}

impl CliContext {
    pub fn new(config_path: PathBuf) -> Result<Self, ConfigError> {
        let mut config = ForgeConfig::load(&config_path)?;
        config.apply_env();
        Ok(Self {
            config_path,
            config,
            output_format: super::OutputFormat::Table,
            quiet: false,
            verbose: false,
        })
    }

    /// Context from the first config file found in the default locations.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(ForgeConfig::discover())
    }

    /// Fatal problems are errors, the rest are warnings.
    pub fn validate_config(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = self.config.validate(self.config.api_key().as_deref())?;
        if !self.config_path.exists() {
            warnings.push(format!(
                "config file {} not found; using defaults",
                self.config_path.display()
            ));
        }
        Ok(warnings)
    }

    pub fn open_registry(&self) -> Result<ToolRegistry, RegistryError> {
        ToolRegistry::open(Box::new(JsonFileStore::<ToolRecord>::new(
            self.config.storage.tools_path(),
        )))
    }

    pub fn open_history(&self) -> Result<ReflectionHistory, StoreError> {
        ReflectionHistory::open(Box::new(JsonFileStore::<ReflectionRecord>::new(
            self.config.storage.reflections_path(),
        )))
    }

    pub fn executor(&self) -> SandboxExecutor {
        SandboxExecutor::new(
            Arc::new(PythonRuntime::new(&self.config.sandbox.python)),
            self.config.sandbox.timeout(),
        )
    }

    pub fn gateway(&self) -> Result<ModelGateway, GatewayError> {
        let provider = provider_from_settings(&self.config.llm, self.config.api_key())?;
        Ok(ModelGateway::new(provider, self.config.llm.max_tokens))
    }

    /// Print status message (respects quiet mode)
    pub fn status(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }

    /// Print verbose message (only in verbose mode)
    pub fn debug(&self, message: &str) {
        if self.verbose {
            eprintln!("[DEBUG] {}", message);
        }
    }
}
