// Toolforge Library
// Self-extending tool library: reflect, implement, validate, repair, integrate

pub mod cli;
pub mod config;
pub mod docs;
pub mod error;
pub mod flexible;
pub mod gateway;
pub mod logging;
pub mod orchestrator;
pub mod reflection;
pub mod registry;
pub mod sandbox;
pub mod solver;
pub mod storage;
pub mod synthesis;
pub mod types;

pub use config::ForgeConfig;
pub use error::{CycleError, StartupError};
pub use orchestrator::{CycleOrchestrator, CycleReport};
pub use types::{Parameter, TypeTag};
