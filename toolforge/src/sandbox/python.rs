//! Python child-process runtime.
//!
//! Every load and every invocation spawns a fresh `python -I` process in a
//! throwaway working directory, so no candidate state survives between
//! executions. The harness script reads a JSON request on stdin and answers
//! with a single marked JSON envelope on stdout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CandidateHandle, CandidateRuntime, RuntimeFault, SandboxError};

const HARNESS: &str = include_str!("harness.py");
const RESULT_MARKER: &str = "__TOOLFORGE_RESULT__";

#[derive(Debug, Serialize)]
struct HarnessRequest<'a> {
    mode: &'a str,
    source: &'a str,
    entry: &'a str,
    args: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct HarnessEnvelope {
    status: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    traceback: Option<String>,
}

/// Python interpreter runtime.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    interpreter: PathBuf,
}

impl PythonRuntime {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    /// Check that the interpreter can be spawned at all.
    pub async fn probe(&self) -> Result<String, SandboxError> {
        let output = Command::new(&self.interpreter)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                SandboxError::Unavailable(format!(
                    "failed to spawn {}: {}",
                    self.interpreter.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(SandboxError::Unavailable(format!(
                "{} --version exited with {}",
                self.interpreter.display(),
                output.status
            )));
        }
        let mut version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            version = String::from_utf8_lossy(&output.stderr).trim().to_string();
        }
        Ok(version)
    }

    async fn run_harness(&self, request: &HarnessRequest<'_>) -> Result<HarnessEnvelope, SandboxError> {
        let payload = serde_json::to_vec(request)?;
        let workdir = tempfile::tempdir()?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .current_dir(workdir.path())
            .env_clear()
            .env("PYTHONHASHSEED", "0")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            SandboxError::Unavailable(format!(
                "failed to spawn {}: {}",
                self.interpreter.display(),
                e
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Protocol("failed to capture stdin".to_string()))?;
        stdin.write_all(&payload).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let envelope_line = stdout
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix(RESULT_MARKER));
        match envelope_line {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(HarnessEnvelope {
                status: "runtime_error".to_string(),
                value: Value::Null,
                error: Some(format!(
                    "process exited with {} before reporting a result: {}",
                    output.status,
                    stderr.trim()
                )),
                traceback: None,
            }),
        }
    }
}

impl Default for PythonRuntime {
    fn default() -> Self {
        Self::new("python3")
    }
}

fn into_fault(envelope: HarnessEnvelope) -> Result<Value, RuntimeFault> {
    let message = match (&envelope.error, &envelope.traceback) {
        (Some(error), Some(tb)) if !tb.trim().is_empty() => format!("{}\n{}", error, tb.trim_end()),
        (Some(error), _) => error.clone(),
        (None, _) => format!("candidate reported status '{}'", envelope.status),
    };
    match envelope.status.as_str() {
        "ok" => Ok(envelope.value),
        "compile_error" => Err(RuntimeFault::Compile(message)),
        "name_error" => Err(RuntimeFault::MissingEntry(message)),
        "runtime_error" => Err(RuntimeFault::Raised(message)),
        other => Err(SandboxError::Protocol(format!("unknown harness status '{}'", other)).into()),
    }
}

struct PythonHandle {
    runtime: PythonRuntime,
    source: String,
    entry: String,
}

#[async_trait]
impl CandidateHandle for PythonHandle {
    async fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
        let envelope = self
            .runtime
            .run_harness(&HarnessRequest {
                mode: "invoke",
                source: &self.source,
                entry: &self.entry,
                args,
            })
            .await?;
        into_fault(envelope)
    }
}

#[async_trait]
impl CandidateRuntime for PythonRuntime {
    fn name(&self) -> &str {
        "python"
    }

    async fn load(&self, source: &str, entry: &str) -> Result<Box<dyn CandidateHandle>, RuntimeFault> {
        let envelope = self
            .run_harness(&HarnessRequest {
                mode: "load",
                source,
                entry,
                args: &[],
            })
            .await?;
        into_fault(envelope)?;
        Ok(Box::new(PythonHandle {
            runtime: self.clone(),
            source: source.to_string(),
            entry: entry.to_string(),
        }))
    }
}
