//! Tool validation: inspect, synthesize inputs, execute each tuple.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::inputs::TestInputSynthesizer;
use super::signature::{self, Signature};
use crate::sandbox::{ErrorRefiner, ExecutionErrorKind, Outcome, SandboxError, SandboxExecutor};

/// One synthesized input tuple and what executing it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub inputs: Vec<Value>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailureKind {
    SignatureError,
    Execution(ExecutionErrorKind),
}

/// PASS/FAIL of a candidate against its synthesized matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub signature: Option<Signature>,
    pub cases: Vec<CaseOutcome>,
    pub failure: Option<FailureKind>,
    pub diagnostic: Option<String>,
}

impl Verdict {
    fn signature_failure(err: signature::SignatureError) -> Self {
        Self {
            passed: false,
            signature: None,
            cases: Vec::new(),
            failure: Some(FailureKind::SignatureError),
            diagnostic: Some(format!("SignatureError: {}", err)),
        }
    }
}

pub struct ToolValidator {
    executor: SandboxExecutor,
    synthesizer: TestInputSynthesizer,
    refiner: ErrorRefiner,
}

impl ToolValidator {
    pub fn new(executor: SandboxExecutor) -> Self {
        Self {
            executor,
            synthesizer: TestInputSynthesizer::new(),
            refiner: ErrorRefiner::new(),
        }
    }

    pub fn executor(&self) -> &SandboxExecutor {
        &self.executor
    }

    /// Validate `source` under the entry name `declared_name`.
    ///
    /// Execution is sequential and stops at the first failing tuple.
    pub async fn validate(&self, source: &str, declared_name: &str) -> Result<Verdict, SandboxError> {
        let signature = match signature::inspect(source, declared_name) {
            Ok(sig) => sig,
            Err(err) => {
                tracing::debug!(tool = declared_name, error = %err, "signature inspection failed");
                return Ok(Verdict::signature_failure(err));
            }
        };

        let matrix = self.synthesizer.synthesize(&signature.parameter_types());
        let mut cases = Vec::with_capacity(matrix.len());
        for inputs in matrix {
            let outcome = self.executor.execute(source, declared_name, &inputs).await?;
            let failed = !outcome.success;
            cases.push(CaseOutcome { inputs, outcome });
            if failed {
                break;
            }
        }

        let first_failure = cases.iter().find(|c| !c.outcome.success);
        let verdict = match first_failure {
            None => Verdict {
                passed: true,
                signature: Some(signature),
                cases,
                failure: None,
                diagnostic: None,
            },
            Some(case) => {
                let kind = case
                    .outcome
                    .error_kind
                    .unwrap_or(ExecutionErrorKind::RuntimeFailure);
                let rendered_inputs = serde_json::to_string(&case.inputs)?;
                let base = format!("Failed on input {}: {}", rendered_inputs, case.outcome.describe());
                let classified = self
                    .refiner
                    .classify(kind, case.outcome.error_text.as_deref().unwrap_or_default());
                let diagnostic = classified.with_hint(&base);
                Verdict {
                    passed: false,
                    signature: Some(signature),
                    failure: Some(FailureKind::Execution(kind)),
                    diagnostic: Some(diagnostic),
                    cases,
                }
            }
        };
        tracing::info!(
            tool = declared_name,
            passed = verdict.passed,
            cases = verdict.cases.len(),
            "validation finished"
        );
        Ok(verdict)
    }
}
