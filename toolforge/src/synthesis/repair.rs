//! Bounded validate/repair loop.
//!
//! ```text
//! Proposed -> Validating -> Accepted
//!                 |  ^
//!                 v  |
//!              Repairing        (attempt < max)
//!                 |
//!                 v
//!              Rejected         (failed at attempt == max)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validator::{CaseOutcome, ToolValidator, Verdict};
use crate::gateway::{GatewayError, ModelGateway};
use crate::reflection::ToolRecommendation;
use crate::sandbox::SandboxError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairState {
    Proposed,
    Validating,
    Repairing,
    Accepted,
    Rejected,
}

/// One validation pass over a candidate source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAttempt {
    pub attempt: u32,
    pub source: String,
    pub cases: Vec<CaseOutcome>,
    pub passed: bool,
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RepairOutcome {
    Accepted {
        source: String,
        verdict: Verdict,
        attempts: Vec<ValidationAttempt>,
        states: Vec<RepairState>,
    },
    Rejected {
        attempts: Vec<ValidationAttempt>,
        states: Vec<RepairState>,
    },
}

impl RepairOutcome {
    pub fn attempts(&self) -> &[ValidationAttempt] {
        match self {
            RepairOutcome::Accepted { attempts, .. } | RepairOutcome::Rejected { attempts, .. } => {
                attempts
            }
        }
    }

    pub fn states(&self) -> &[RepairState] {
        match self {
            RepairOutcome::Accepted { states, .. } | RepairOutcome::Rejected { states, .. } => states,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RepairOutcome::Accepted { .. })
    }
}

/// Infrastructure failures that abort the loop; candidate defects never
/// surface here.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("repair request failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("sandbox failure during validation: {0}")]
    Sandbox(#[from] SandboxError),
}

pub struct RepairLoop {
    max_attempts: u32,
}

impl Default for RepairLoop {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RepairLoop {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive `initial_source` to Accepted or Rejected. The attempt count is
    /// the only bound; each failed attempt before the last asks the gateway
    /// for a corrected source.
    pub async fn run(
        &self,
        validator: &ToolValidator,
        gateway: &ModelGateway,
        recommendation: &ToolRecommendation,
        initial_source: String,
    ) -> Result<RepairOutcome, RepairError> {
        let name = recommendation.name.as_str();
        let mut states = vec![RepairState::Proposed];
        let mut attempts: Vec<ValidationAttempt> = Vec::new();
        let mut source = initial_source;

        for attempt in 1..=self.max_attempts {
            states.push(RepairState::Validating);
            let verdict = validator.validate(&source, name).await?;
            attempts.push(ValidationAttempt {
                attempt,
                source: source.clone(),
                cases: verdict.cases.clone(),
                passed: verdict.passed,
                diagnostic: verdict.diagnostic.clone(),
            });

            if verdict.passed {
                states.push(RepairState::Accepted);
                tracing::info!(tool = name, attempt, "candidate accepted");
                return Ok(RepairOutcome::Accepted {
                    source,
                    verdict,
                    attempts,
                    states,
                });
            }

            tracing::warn!(
                tool = name,
                attempt,
                max_attempts = self.max_attempts,
                diagnostic = verdict.diagnostic.as_deref().unwrap_or_default(),
                "candidate failed validation"
            );
            if attempt == self.max_attempts {
                break;
            }

            states.push(RepairState::Repairing);
            source = gateway.request_repair(recommendation, &attempts).await?;
        }

        states.push(RepairState::Rejected);
        tracing::warn!(tool = name, attempts = attempts.len(), "candidate rejected");
        Ok(RepairOutcome::Rejected { attempts, states })
    }
}
