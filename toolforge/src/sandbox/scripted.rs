//! In-process runtime whose candidates are Rust closures keyed by source text.
//!
//! Used to exercise validation and repair without an interpreter.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{CandidateHandle, CandidateRuntime, RuntimeFault, SandboxError};

type Behavior = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
enum Script {
    Callable {
        entry: String,
        delay: Option<Duration>,
        behavior: Behavior,
    },
    CompileError(String),
}

#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: HashMap<String, Script>,
    unavailable: Option<String>,
    loads: Arc<AtomicUsize>,
    invocations: Arc<AtomicUsize>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidate<F>(self, source: &str, entry: &str, behavior: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(source, entry, None, Arc::new(behavior))
    }

    /// Candidate that sleeps for `delay` before answering.
    pub fn with_slow_candidate<F>(self, source: &str, entry: &str, delay: Duration, behavior: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(source, entry, Some(delay), Arc::new(behavior))
    }

    pub fn with_compile_error(mut self, source: &str, message: &str) -> Self {
        self.scripts
            .insert(source.trim().to_string(), Script::CompileError(message.to_string()));
        self
    }

    /// Every load fails with [`SandboxError::Unavailable`].
    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn insert(mut self, source: &str, entry: &str, delay: Option<Duration>, behavior: Behavior) -> Self {
        self.scripts.insert(
            source.trim().to_string(),
            Script::Callable {
                entry: entry.to_string(),
                delay,
                behavior,
            },
        );
        self
    }
}

struct ScriptedHandle {
    delay: Option<Duration>,
    behavior: Behavior,
    invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl CandidateHandle for ScriptedHandle {
    async fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.behavior)(args).map_err(RuntimeFault::Raised)
    }
}

#[async_trait]
impl CandidateRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self, source: &str, entry: &str) -> Result<Box<dyn CandidateHandle>, RuntimeFault> {
        if let Some(reason) = &self.unavailable {
            return Err(SandboxError::Unavailable(reason.clone()).into());
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(source.trim()) {
            None => Err(RuntimeFault::Compile(
                "SyntaxError: unrecognized candidate source".to_string(),
            )),
            Some(Script::CompileError(message)) => Err(RuntimeFault::Compile(message.clone())),
            Some(Script::Callable { entry: defined, .. }) if defined != entry => Err(
                RuntimeFault::MissingEntry(format!("NameError: name '{}' is not defined", entry)),
            ),
            Some(Script::Callable { delay, behavior, .. }) => Ok(Box::new(ScriptedHandle {
                delay: *delay,
                behavior: Arc::clone(behavior),
                invocations: Arc::clone(&self.invocations),
            })),
        }
    }
}
