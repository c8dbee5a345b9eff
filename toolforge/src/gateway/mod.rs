//! Model Gateway: text completion for reflections, implementations,
//! repairs, capability summaries and task plans.
//!
//! Providers implement [`LlmProvider`]; [`ModelGateway`] shapes the five
//! request kinds on top of whichever provider is configured.

pub mod anthropic;
pub mod extract;
pub mod openai;
pub mod prompts;
pub mod stub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::config::LlmSettings;
use crate::reflection::{ReflectionRecord, ToolRecommendation};
use crate::registry::ToolSummary;
use crate::synthesis::ValidationAttempt;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use stub::StubLlmProvider;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("no source code found in {0} response")]
    NoCode(RequestKind),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// The request shapes sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Reflection,
    Implementation,
    Repair,
    Summary,
    Solve,
}

impl RequestKind {
    pub fn temperature(&self) -> f32 {
        match self {
            RequestKind::Reflection => 0.7,
            RequestKind::Implementation | RequestKind::Repair => 0.2,
            RequestKind::Summary => 0.5,
            RequestKind::Solve => 0.3,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestKind::Reflection => "reflection",
            RequestKind::Implementation => "implementation",
            RequestKind::Repair => "repair",
            RequestKind::Summary => "summary",
            RequestKind::Solve => "solve",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub kind: RequestKind,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Information about an LLM provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmProviderInfo {
    pub name: String,
    pub model: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError>;

    fn info(&self) -> LlmProviderInfo;
}

/// Build the provider named by `settings.provider`.
pub fn provider_from_settings(
    settings: &LlmSettings,
    api_key: Option<String>,
) -> Result<Arc<dyn LlmProvider>, GatewayError> {
    let timeout = std::time::Duration::from_secs(settings.timeout_secs);
    let require_key = |key: Option<String>| {
        key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            GatewayError::Unavailable(format!(
                "no API key for provider '{}' (set {})",
                settings.provider, settings.api_key_env
            ))
        })
    };
    match settings.provider.as_str() {
        "openai" | "openrouter" => {
            let base_url = settings.base_url.clone().unwrap_or_else(|| {
                if settings.provider == "openrouter" {
                    "https://openrouter.ai/api/v1".to_string()
                } else {
                    "https://api.openai.com/v1".to_string()
                }
            });
            Ok(Arc::new(OpenAiProvider::new(
                &settings.model,
                require_key(api_key)?,
                &base_url,
                timeout,
            )?))
        }
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(
            &settings.model,
            require_key(api_key)?,
            settings.base_url.as_deref(),
            timeout,
        )?)),
        "stub" => Ok(Arc::new(StubLlmProvider::new())),
        other => Err(GatewayError::Unavailable(format!("unknown provider '{}'", other))),
    }
}

/// Request/response front door to the language model.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    pub fn provider_info(&self) -> LlmProviderInfo {
        self.provider.info()
    }

    async fn send(&self, kind: RequestKind, prompt: prompts::Prompt) -> Result<String, GatewayError> {
        let request = CompletionRequest {
            kind,
            system: prompt.system,
            prompt: prompt.user,
            temperature: kind.temperature(),
            max_tokens: self.max_tokens,
        };
        let started = Instant::now();
        let result = self.provider.complete(&request).await;
        match &result {
            Ok(text) => tracing::info!(
                kind = %kind,
                chars = text.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "gateway response received"
            ),
            Err(err) => tracing::warn!(kind = %kind, error = %err, "gateway request failed"),
        }
        result
    }

    /// Raw reflection text; parsing belongs to the reflection engine.
    pub async fn request_reflection(
        &self,
        tools: &[ToolSummary],
        recent: &[ReflectionRecord],
    ) -> Result<String, GatewayError> {
        self.send(RequestKind::Reflection, prompts::reflection(tools, recent))
            .await
    }

    /// Source text for a new tool, extracted and normalized.
    pub async fn request_implementation(
        &self,
        recommendation: &ToolRecommendation,
        existing: &[ToolSummary],
    ) -> Result<String, GatewayError> {
        let response = self
            .send(
                RequestKind::Implementation,
                prompts::implementation(recommendation, existing),
            )
            .await?;
        extract::extract_source(&response, &recommendation.name)
            .ok_or(GatewayError::NoCode(RequestKind::Implementation))
    }

    /// Revised source given the attempts made so far; the last attempt
    /// carries the prior source and its diagnostic.
    pub async fn request_repair(
        &self,
        recommendation: &ToolRecommendation,
        attempts: &[ValidationAttempt],
    ) -> Result<String, GatewayError> {
        let response = self
            .send(RequestKind::Repair, prompts::repair(recommendation, attempts))
            .await?;
        extract::extract_source(&response, &recommendation.name)
            .ok_or(GatewayError::NoCode(RequestKind::Repair))
    }

    pub async fn request_summary(&self, tools: &[ToolSummary]) -> Result<String, GatewayError> {
        let text = self
            .send(RequestKind::Summary, prompts::summary(tools))
            .await?;
        Ok(text.trim().to_string())
    }

    /// Raw plan text for solving `task` with the registered tools; parsing
    /// belongs to the solver.
    pub async fn request_plan(&self, task: &str, tools: &[ToolSummary]) -> Result<String, GatewayError> {
        self.send(RequestKind::Solve, prompts::solve(task, tools)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperatures_follow_request_kind() {
        assert_eq!(RequestKind::Reflection.temperature(), 0.7);
        assert_eq!(RequestKind::Implementation.temperature(), 0.2);
        assert_eq!(RequestKind::Repair.temperature(), 0.2);
        assert_eq!(RequestKind::Summary.temperature(), 0.5);
        assert_eq!(RequestKind::Solve.temperature(), 0.3);
        assert_eq!(RequestKind::Solve.to_string(), "solve");
    }

    #[test]
    fn provider_selection_requires_key_for_remote_providers() {
        let mut settings = LlmSettings::default();
        settings.provider = "openai".into();
        assert!(matches!(
            provider_from_settings(&settings, None),
            Err(GatewayError::Unavailable(_))
        ));
        assert!(provider_from_settings(&settings, Some("sk-test".into())).is_ok());

        settings.provider = "stub".into();
        let stub = provider_from_settings(&settings, None).unwrap();
        assert_eq!(stub.info().name, "stub");

        settings.provider = "mystery".into();
        assert!(provider_from_settings(&settings, None).is_err());
    }

    #[tokio::test]
    async fn implementation_request_extracts_fenced_source() {
        let stub = Arc::new(StubLlmProvider::new());
        stub.push(
            RequestKind::Implementation,
            "Here you go:\n```python\ndef add(a: int, b: int) -> int:\n    return a + b\n```\n",
        );
        let gateway = ModelGateway::new(stub.clone(), 1024);
        assert_eq!(gateway.provider_info().name, "stub");
        let rec = ToolRecommendation::new("add", "Add two integers");
        let source = gateway.request_implementation(&rec, &[]).await.unwrap();
        assert_eq!(source, "def add(a: int, b: int) -> int:\n    return a + b\n");

        let sent = stub.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].temperature, 0.2);
        assert!(sent[0].prompt.contains("add"));
    }

    #[tokio::test]
    async fn prose_without_code_is_a_gateway_error() {
        let stub = Arc::new(StubLlmProvider::new());
        stub.push(RequestKind::Implementation, "I cannot help with that.");
        let gateway = ModelGateway::new(stub, 1024);
        let rec = ToolRecommendation::new("add", "Add two integers");
        let err = gateway.request_implementation(&rec, &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoCode(RequestKind::Implementation)));
    }
}
