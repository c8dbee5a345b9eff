//! Error aggregation at the orchestrator boundary.

use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::reflection::ReflectionError;
use crate::registry::RegistryError;
use crate::sandbox::SandboxError;
use crate::storage::StoreError;
use crate::synthesis::RepairError;

/// Failures that end a cycle early. The orchestrator logs them and moves on.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Reflection(#[from] ReflectionError),
    #[error("implementation request failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Repair(#[from] RepairError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl CycleError {
    /// Pipeline stage the error belongs to, for logs and reports.
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Reflection(_) => "reflect",
            CycleError::Gateway(_) => "implement",
            CycleError::Repair(_) | CycleError::Sandbox(_) => "validate",
            CycleError::Registry(_) => "integrate",
        }
    }
}

/// Failures that prevent the orchestrator from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("cannot reach model provider: {0}")]
    Gateway(#[from] GatewayError),
    #[error("sandbox unavailable: {0}")]
    Sandbox(#[from] SandboxError),
}
