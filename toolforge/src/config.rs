//! Configuration: TOML file, then `TOOLFORGE_*` environment overrides, then
//! command-line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub const DEFAULT_CONFIG_FILE: &str = "toolforge.toml";
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "anthropic", "stub"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub llm: LlmSettings,
    pub cycle: CycleSettings,
    pub sandbox: SandboxSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleSettings {
    pub max_repair_attempts: u32,
    /// 0 runs until interrupted.
    pub max_cycles: u64,
    pub delay_after_success_secs: u64,
    pub delay_after_failure_secs: u64,
    /// Jaccard word similarity above which a new tool counts as a duplicate.
    /// `None` disables the check.
    pub similarity_threshold: Option<f64>,
    /// Capability summary every N cycles; 0 disables.
    pub summary_interval: u64,
    pub seed_tools: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            max_repair_attempts: 3,
            max_cycles: 0,
            delay_after_success_secs: 30,
            delay_after_failure_secs: 60,
            similarity_threshold: Some(0.8),
            summary_interval: 3,
            seed_tools: true,
        }
    }
}

impl CycleSettings {
    pub fn delay_after(&self, integrated: bool) -> Duration {
        Duration::from_secs(if integrated {
            self.delay_after_success_secs
        } else {
            self.delay_after_failure_secs
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub python: String,
    pub timeout_ms: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl SandboxSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub dir: PathBuf,
    pub tools_file: String,
    pub reflections_file: String,
    pub docs_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            tools_file: "tools.json".to_string(),
            reflections_file: "reflections.json".to_string(),
            docs_file: "tools_documentation.md".to_string(),
        }
    }
}

impl StorageSettings {
    pub fn tools_path(&self) -> PathBuf {
        self.dir.join(&self.tools_file)
    }

    pub fn reflections_path(&self) -> PathBuf {
        self.dir.join(&self.reflections_file)
    }

    pub fn docs_path(&self) -> PathBuf {
        self.dir.join(&self.docs_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("toolforge.log")),
        }
    }
}

impl ForgeConfig {
    /// Parse a config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// First existing default location, or `toolforge.toml` if none exists.
    pub fn discover() -> PathBuf {
        let candidates = [
            PathBuf::from(DEFAULT_CONFIG_FILE),
            PathBuf::from("config").join(DEFAULT_CONFIG_FILE),
        ];
        candidates
            .iter()
            .find(|p| p.exists())
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Apply `TOOLFORGE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("TOOLFORGE_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = get("TOOLFORGE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("TOOLFORGE_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = get("TOOLFORGE_STORAGE_DIR") {
            self.storage.dir = PathBuf::from(v);
        }
        if let Some(v) = get("TOOLFORGE_PYTHON") {
            self.sandbox.python = v;
        }
        if let Some(v) = get("TOOLFORGE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(n) = get("TOOLFORGE_MAX_REPAIR_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.cycle.max_repair_attempts = n;
        }
    }

    /// API key from the variable named by `llm.api_key_env`.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Fatal problems are errors; everything else comes back as warnings.
    pub fn validate(&self, api_key: Option<&str>) -> Result<Vec<String>, ConfigError> {
        if !KNOWN_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown llm.provider '{}' (expected one of: {})",
                self.llm.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }
        if self.llm.provider != "stub" && api_key.map_or(true, |k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "missing API key: set {} for provider '{}'",
                self.llm.api_key_env, self.llm.provider
            )));
        }
        if self.cycle.max_repair_attempts == 0 {
            return Err(ConfigError::Invalid(
                "cycle.max_repair_attempts must be at least 1".to_string(),
            ));
        }
        if self.sandbox.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(t) = self.cycle.similarity_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::Invalid(format!(
                    "cycle.similarity_threshold {} is outside 0.0..=1.0",
                    t
                )));
            }
        }

        let mut warnings = Vec::new();
        if self.llm.provider == "stub" {
            warnings.push("llm.provider is 'stub': no model will be contacted".to_string());
        }
        if self.cycle.similarity_threshold.is_none() {
            warnings.push("similarity guard disabled".to_string());
        }
        if self.cycle.max_cycles == 0 {
            warnings.push("cycle.max_cycles = 0: runs until interrupted".to_string());
        }
        if self.sandbox.timeout_ms > 60_000 {
            warnings.push(format!(
                "sandbox.timeout_ms = {} is unusually long",
                self.sandbox.timeout_ms
            ));
        }
        Ok(warnings)
    }
}

pub const CONFIG_TEMPLATE: &str = r#"# Toolforge configuration
# Generated by: toolforge config init

[llm]
# openai | openrouter | anthropic | stub
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
# base_url = "http://localhost:8000/v1"
max_tokens = 2000
timeout_secs = 60

[cycle]
max_repair_attempts = 3
# 0 = run until interrupted
max_cycles = 0
delay_after_success_secs = 30
delay_after_failure_secs = 60
similarity_threshold = 0.8
summary_interval = 3
seed_tools = true

[sandbox]
python = "python3"
timeout_ms = 5000

[storage]
dir = "."
tools_file = "tools.json"
reflections_file = "reflections.json"
docs_file = "tools_documentation.md"

[logging]
level = "info"
file = "toolforge.log"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn template_parses_to_defaults() {
        let parsed = ForgeConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed, ForgeConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed = ForgeConfig::from_toml("[cycle]\nmax_repair_attempts = 5\n").unwrap();
        assert_eq!(parsed.cycle.max_repair_attempts, 5);
        assert_eq!(parsed.cycle.delay_after_failure_secs, 60);
        assert_eq!(parsed.llm.provider, "openai");
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut cfg = ForgeConfig::default();
        let env: HashMap<&str, &str> = [
            ("TOOLFORGE_LLM_PROVIDER", "anthropic"),
            ("TOOLFORGE_MAX_REPAIR_ATTEMPTS", "4"),
            ("TOOLFORGE_LLM_MODEL", ""),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.llm.provider, "anthropic");
        assert_eq!(cfg.cycle.max_repair_attempts, 4);
        assert_eq!(cfg.llm.model, "gpt-4o");
    }

    #[test]
    fn missing_key_is_fatal_except_for_stub() {
        let mut cfg = ForgeConfig::default();
        assert!(cfg.validate(None).is_err());
        assert!(cfg.validate(Some("sk-1")).is_ok());
        cfg.llm.provider = "stub".into();
        let warnings = cfg.validate(None).unwrap();
        assert!(warnings.iter().any(|w| w.contains("stub")));
    }

    #[test]
    fn zero_repair_attempts_is_invalid() {
        let mut cfg = ForgeConfig::default();
        cfg.cycle.max_repair_attempts = 0;
        assert!(matches!(cfg.validate(Some("k")), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn adaptive_delay_depends_on_outcome() {
        let cycle = CycleSettings::default();
        assert_eq!(cycle.delay_after(true), Duration::from_secs(30));
        assert_eq!(cycle.delay_after(false), Duration::from_secs(60));
    }
}
