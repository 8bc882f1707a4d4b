//! # weave-llm
//!
//! A streaming chat client against an Ollama-compatible local model server:
//! connectivity checks, NDJSON stream consumption with per-token fan-out,
//! and the lenient tool-call metadata extractor described in `metadata` and
//! `stream`.

mod client;
mod metadata;
mod stream;

pub use client::{LlmClient, PartialChatError};
pub use metadata::{GenerationUpdate, extract_update_generation, parse_arguments, update_generation_tool_schema};
pub use stream::ChatStreamParser;
