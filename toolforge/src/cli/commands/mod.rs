//! CLI command implementations

pub mod config;
pub mod docs;
pub mod reflections;
pub mod run;
pub mod solve;
pub mod summary;
pub mod tools;
pub mod validate;
