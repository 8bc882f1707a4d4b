//! # weave-config
//!
//! Loads `weave.toml`, applies environment overrides, and validates the
//! result. Shared by `weave-worker` and `weave-orchestrator` so both
//! binaries agree on socket paths, LLM connection details, and generation
//! defaults.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{ConfigWarning, GenerationConfig, LlmConfig, LoggingConfig, WarningSeverity, WeaveConfig, WorkerConfig};
