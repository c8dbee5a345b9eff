//! Cycle Orchestrator: reflect -> plan -> implement -> validate/repair ->
//! integrate, one cycle at a time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::ForgeConfig;
use crate::docs;
use crate::error::{CycleError, StartupError};
use crate::gateway::{provider_from_settings, GatewayError, ModelGateway};
use crate::reflection::{ReflectionEngine, ReflectionHistory, ReflectionRecord, ToolRecommendation};
use crate::registry::{RegistryError, ToolRecord, ToolRegistry};
use crate::sandbox::{PythonRuntime, SandboxExecutor};
use crate::storage::{JsonFileStore, StoreError};
use crate::synthesis::signature::extract_docstring;
use crate::synthesis::{RepairLoop, RepairOutcome, ToolValidator, Verdict};

/// A tool installed when the registry starts out empty.
#[derive(Debug, Clone, Copy)]
pub struct SeedTool {
    pub name: &'static str,
    pub category: &'static str,
    pub purpose: &'static str,
    pub source: &'static str,
}

pub const SEED_TOOLS: &[SeedTool] = &[
    SeedTool {
        name: "reverse_string",
        category: "text processing",
        purpose: "Reverse the input string.",
        source: "def reverse_string(text: str) -> str:\n    \"\"\"Reverse the input string.\"\"\"\n    return text[::-1]\n",
    },
    SeedTool {
        name: "calculate_sum",
        category: "math",
        purpose: "Calculate the sum of a list of numbers.",
        source: "def calculate_sum(numbers: list[float]) -> float:\n    \"\"\"Calculate the sum of a list of numbers.\"\"\"\n    return float(sum(numbers))\n",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub max_repair_attempts: u32,
    pub similarity_threshold: Option<f64>,
    pub summary_interval: u64,
    pub delay_after_success: Duration,
    pub delay_after_failure: Duration,
    pub seed_tools: bool,
    pub docs_path: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&ForgeConfig::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            max_repair_attempts: config.cycle.max_repair_attempts,
            similarity_threshold: config.cycle.similarity_threshold,
            summary_interval: config.cycle.summary_interval,
            delay_after_success: config.cycle.delay_after(true),
            delay_after_failure: config.cycle.delay_after(false),
            seed_tools: config.cycle.seed_tools,
            docs_path: Some(config.storage.docs_path()),
        }
    }
}

/// What one cycle achieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CycleReport {
    Integrated {
        name: String,
        attempts: u32,
    },
    Rejected {
        name: String,
        attempts: u32,
        diagnostic: Option<String>,
    },
    Skipped {
        stage: String,
        reason: String,
    },
}

impl CycleReport {
    pub fn is_integrated(&self) -> bool {
        matches!(self, CycleReport::Integrated { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub integrated: u64,
    pub rejected: u64,
    pub skipped: u64,
    pub interrupted: bool,
    pub reports: Vec<CycleReport>,
}

/// Word-set Jaccard similarity of two sources.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

fn build_record(
    recommendation: &ToolRecommendation,
    source: String,
    verdict: Verdict,
    attempts: u32,
) -> ToolRecord {
    let signature = verdict.signature.unwrap_or_else(|| crate::synthesis::Signature {
        name: recommendation.name.clone(),
        parameters: Vec::new(),
        return_type: crate::types::TypeTag::Any,
    });
    let documentation = extract_docstring(&source, &recommendation.name)
        .unwrap_or_else(|| recommendation.purpose.clone());
    ToolRecord {
        name: recommendation.name.clone(),
        category: recommendation.category.clone(),
        purpose: recommendation.purpose.clone(),
        parameters: signature.parameters,
        return_type: signature.return_type,
        source,
        documentation,
        created_at: Utc::now(),
        test_outcomes: verdict.cases,
        validation_attempts: attempts,
    }
}

pub struct CycleOrchestrator {
    registry: ToolRegistry,
    reflection: ReflectionEngine,
    gateway: ModelGateway,
    validator: ToolValidator,
    repair: RepairLoop,
    settings: OrchestratorSettings,
    cycles_run: u64,
}

impl CycleOrchestrator {
    pub fn new(
        registry: ToolRegistry,
        history: ReflectionHistory,
        gateway: ModelGateway,
        validator: ToolValidator,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            reflection: ReflectionEngine::new(gateway.clone(), history),
            gateway,
            validator,
            repair: RepairLoop::new(settings.max_repair_attempts),
            settings,
            cycles_run: 0,
        }
    }

    /// Wire everything from configuration: provider, Python sandbox and
    /// JSON stores. Fails on invalid config, missing credentials, a missing
    /// interpreter or corrupt stores.
    pub async fn from_config(config: &ForgeConfig) -> Result<Self, StartupError> {
        let api_key = config.api_key();
        for warning in config.validate(api_key.as_deref())? {
            tracing::warn!("config: {}", warning);
        }

        let provider = provider_from_settings(&config.llm, api_key)?;
        let gateway = ModelGateway::new(provider, config.llm.max_tokens);
        let info = gateway.provider_info();
        tracing::info!(provider = %info.name, model = %info.model, "model gateway ready");

        let python = PythonRuntime::new(&config.sandbox.python);
        let version = python.probe().await?;
        let validator = ToolValidator::new(SandboxExecutor::new(
            Arc::new(python),
            config.sandbox.timeout(),
        ));
        tracing::info!(
            runtime = validator.executor().runtime_name(),
            interpreter = %config.sandbox.python,
            %version,
            "sandbox ready"
        );

        let registry = ToolRegistry::open(Box::new(JsonFileStore::<ToolRecord>::new(
            config.storage.tools_path(),
        )))?;
        let history = ReflectionHistory::open(Box::new(JsonFileStore::<ReflectionRecord>::new(
            config.storage.reflections_path(),
        )))?;

        Ok(Self::new(
            registry,
            history,
            gateway,
            validator,
            OrchestratorSettings::from_config(config),
        ))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn reflection_history(&self) -> &ReflectionHistory {
        self.reflection.history()
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn validator(&self) -> &ToolValidator {
        &self.validator
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    /// Install the seed tools into an empty registry and export docs.
    /// Seeds go through the same validation as generated tools; a seed that
    /// fails is logged and skipped.
    pub async fn bootstrap(&mut self) -> Result<(), StartupError> {
        if self.settings.seed_tools && self.registry.is_empty() {
            for seed in SEED_TOOLS {
                let verdict = self.validator.validate(seed.source, seed.name).await?;
                if !verdict.passed {
                    tracing::warn!(
                        tool = seed.name,
                        diagnostic = verdict.diagnostic.as_deref().unwrap_or_default(),
                        "seed tool failed validation; skipping"
                    );
                    continue;
                }
                let rec = ToolRecommendation::new(seed.name, seed.purpose).with_category(seed.category);
                self.registry
                    .register(build_record(&rec, seed.source.to_string(), verdict, 1))?;
            }
        }
        self.export_docs();
        tracing::info!(tools = self.registry.len(), "orchestrator ready");
        Ok(())
    }

    fn export_docs(&self) {
        if let Some(path) = &self.settings.docs_path {
            match docs::export(&self.registry.all(), path) {
                Ok(()) => tracing::debug!(path = %path.display(), "documentation exported"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "documentation export failed")
                }
            }
        }
    }

    /// The most similar existing tool and its score.
    fn most_similar(&self, source: &str) -> Option<(String, f64)> {
        self.registry
            .iter()
            .map(|t| (t.name.clone(), jaccard_similarity(source, &t.source)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Run one cycle. Errors never escape: they degrade to `Skipped`.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles_run += 1;
        let cycle = self.cycles_run;
        let span = tracing::info_span!("cycle", n = cycle);
        match self.try_cycle().instrument(span).await {
            Ok(report) => {
                tracing::info!(cycle, report = ?report, "cycle finished");
                report
            }
            Err(err) => {
                tracing::warn!(cycle, stage = err.stage(), error = %err, "cycle aborted");
                CycleReport::Skipped {
                    stage: err.stage().to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn try_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let summaries = self.registry.summaries();
        let reflection = self.reflection.reflect(&summaries).await?;
        let recommendation = reflection.next_tool_recommendation;
        tracing::info!(tool = %recommendation.name, purpose = %recommendation.purpose, "planning tool");

        if self.registry.contains(&recommendation.name) {
            let err = RegistryError::DuplicateName(recommendation.name.clone());
            tracing::info!(error = %err, "recommendation already exists; skipping");
            return Ok(CycleReport::Skipped {
                stage: "plan".to_string(),
                reason: err.to_string(),
            });
        }

        let source = self
            .gateway
            .request_implementation(&recommendation, &summaries)
            .await?;
        let outcome = self
            .repair
            .run(&self.validator, &self.gateway, &recommendation, source)
            .await?;

        match outcome {
            RepairOutcome::Rejected { attempts, .. } => Ok(CycleReport::Rejected {
                name: recommendation.name,
                attempts: attempts.len() as u32,
                diagnostic: attempts.last().and_then(|a| a.diagnostic.clone()),
            }),
            RepairOutcome::Accepted {
                source,
                verdict,
                attempts,
                ..
            } => {
                if let (Some(threshold), Some((similar_to, score))) =
                    (self.settings.similarity_threshold, self.most_similar(&source))
                {
                    if score > threshold {
                        return Ok(CycleReport::Skipped {
                            stage: "integrate".to_string(),
                            reason: format!(
                                "'{}' is too similar to existing tool '{}' ({:.2})",
                                recommendation.name, similar_to, score
                            ),
                        });
                    }
                }
                let attempts = attempts.len() as u32;
                let name = recommendation.name.clone();
                self.registry
                    .register(build_record(&recommendation, source, verdict, attempts))?;
                self.export_docs();
                Ok(CycleReport::Integrated { name, attempts })
            }
        }
    }

    /// Human-readable capability summary of the current registry.
    pub async fn summary(&self) -> Result<String, GatewayError> {
        self.gateway.request_summary(&self.registry.summaries()).await
    }

    /// Run cycles back to back until `max_cycles` is reached (when set) or
    /// `shutdown` flips to true. In-flight cycles are never interrupted;
    /// the signal is observed between cycles and during pauses.
    pub async fn run(&mut self, max_cycles: Option<u64>, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut summary = RunSummary::default();
        loop {
            if max_cycles.map_or(false, |max| summary.cycles >= max) {
                break;
            }
            if *shutdown.borrow() {
                summary.interrupted = true;
                break;
            }

            let report = self.run_cycle().await;
            summary.cycles += 1;
            match &report {
                CycleReport::Integrated { .. } => summary.integrated += 1,
                CycleReport::Rejected { .. } => summary.rejected += 1,
                CycleReport::Skipped { .. } => summary.skipped += 1,
            }
            let integrated = report.is_integrated();
            summary.reports.push(report);

            if self.settings.summary_interval > 0
                && summary.cycles % self.settings.summary_interval == 0
            {
                match self.summary().await {
                    Ok(text) => tracing::info!(summary = %text, "capability summary"),
                    Err(err) => tracing::warn!(error = %err, "capability summary failed"),
                }
            }

            if max_cycles.map_or(false, |max| summary.cycles >= max) {
                break;
            }
            let delay = if integrated {
                self.settings.delay_after_success
            } else {
                self.settings.delay_after_failure
            };
            tracing::info!(delay_secs = delay.as_secs(), "pausing before next cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        summary.interrupted = true;
                        break;
                    }
                }
            }
        }
        tracing::info!(
            cycles = summary.cycles,
            integrated = summary.integrated,
            rejected = summary.rejected,
            skipped = summary.skipped,
            "run finished"
        );
        summary
    }

    /// Rewrite both stores from memory.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.registry.flush()?;
        self.reflection.history().flush()
    }
}
