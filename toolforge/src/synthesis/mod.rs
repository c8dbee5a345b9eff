//! Candidate synthesis pipeline: signature inspection, test inputs,
//! validation and the bounded repair loop.

pub mod inputs;
pub mod repair;
pub mod signature;
pub mod validator;

pub use inputs::TestInputSynthesizer;
pub use repair::{RepairError, RepairLoop, RepairOutcome, RepairState, ValidationAttempt};
pub use signature::{inspect, normalize_annotations, Signature, SignatureError};
pub use validator::{CaseOutcome, ToolValidator, Verdict};
