//! Sandboxed execution of candidate sources.
//!
//! Execution is a two-stage pipeline behind [`CandidateRuntime`]: `load`
//! compiles a source into a fresh namespace and resolves the entry callable,
//! `invoke` calls it with an argument tuple. [`SandboxExecutor`] bounds both
//! stages with a wall-clock timeout and folds the result into an [`Outcome`].

pub mod python;
pub mod refiner;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub use python::PythonRuntime;
pub use refiner::{ClassifiedError, ErrorClass, ErrorRefiner};
pub use scripted::ScriptedRuntime;

/// Infrastructure failures: the sandbox itself could not do its job.
/// These are never attributed to the candidate.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox runtime unavailable: {0}")]
    Unavailable(String),
    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sandbox protocol error: {0}")]
    Protocol(String),
    #[error("sandbox serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a load or invoke stage did not produce a value.
#[derive(Debug, Error)]
pub enum RuntimeFault {
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    MissingEntry(String),
    #[error("{0}")]
    Raised(String),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// A resolved entry callable, ready to be invoked.
#[async_trait]
pub trait CandidateHandle: Send + Sync {
    async fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeFault>;
}

/// Loads candidate sources into isolated namespaces.
#[async_trait]
pub trait CandidateRuntime: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, source: &str, entry: &str)
        -> Result<Box<dyn CandidateHandle>, RuntimeFault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionErrorKind {
    CompileError,
    NameError,
    RuntimeFailure,
    Timeout,
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionErrorKind::CompileError => "CompileError",
            ExecutionErrorKind::NameError => "NameError",
            ExecutionErrorKind::RuntimeFailure => "RuntimeFailure",
            ExecutionErrorKind::Timeout => "Timeout",
        };
        f.write_str(label)
    }
}

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ExecutionErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub elapsed_ms: u64,
}

impl Outcome {
    pub fn success(value: Value, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            value: Some(value),
            error_kind: None,
            error_text: None,
            elapsed_ms,
        }
    }

    pub fn failure(kind: ExecutionErrorKind, text: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            value: None,
            error_kind: Some(kind),
            error_text: Some(text.into()),
            elapsed_ms,
        }
    }

    /// `<kind>: <text>` for failures, empty for successes.
    pub fn describe(&self) -> String {
        match (&self.error_kind, &self.error_text) {
            (Some(kind), Some(text)) => format!("{}: {}", kind, text),
            (Some(kind), None) => kind.to_string(),
            _ => String::new(),
        }
    }
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs candidates through a [`CandidateRuntime`] under a timeout.
#[derive(Clone)]
pub struct SandboxExecutor {
    runtime: Arc<dyn CandidateRuntime>,
    timeout: Duration,
}

impl SandboxExecutor {
    pub fn new(runtime: Arc<dyn CandidateRuntime>, timeout: Duration) -> Self {
        Self { runtime, timeout }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load `source`, resolve `entry` and invoke it with `args`.
    ///
    /// Candidate defects come back as a failed [`Outcome`]; only
    /// infrastructure problems are returned as `Err`.
    pub async fn execute(
        &self,
        source: &str,
        entry: &str,
        args: &[Value],
    ) -> Result<Outcome, SandboxError> {
        let started = Instant::now();
        let pipeline = async {
            let handle = self.runtime.load(source, entry).await?;
            handle.invoke(args).await
        };
        let result = tokio::time::timeout(self.timeout, pipeline).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Err(_) => Outcome::failure(
                ExecutionErrorKind::Timeout,
                format!("execution exceeded {}ms", self.timeout.as_millis()),
                elapsed_ms,
            ),
            Ok(Ok(value)) => Outcome::success(value, elapsed_ms),
            Ok(Err(RuntimeFault::Compile(text))) => {
                Outcome::failure(ExecutionErrorKind::CompileError, text, elapsed_ms)
            }
            Ok(Err(RuntimeFault::MissingEntry(text))) => {
                Outcome::failure(ExecutionErrorKind::NameError, text, elapsed_ms)
            }
            Ok(Err(RuntimeFault::Raised(text))) => {
                Outcome::failure(ExecutionErrorKind::RuntimeFailure, text, elapsed_ms)
            }
            Ok(Err(RuntimeFault::Sandbox(err))) => return Err(err),
        };
        tracing::debug!(
            runtime = self.runtime.name(),
            entry,
            success = outcome.success,
            elapsed_ms,
            "candidate executed"
        );
        Ok(outcome)
    }
}
