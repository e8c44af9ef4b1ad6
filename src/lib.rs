//! drug-interaction-api: drug interaction analysis over a quantized LLM.
//!
//! Validates two-drug and patient-case queries, renders them into
//! instruction prompts, runs a single blocking generation against a GGUF
//! model loaded once per process, and returns the answer as JSON.
//!
//! - [`query`]: request shapes and validation
//! - [`prompt`]: prompt templates
//! - [`analysis`]: splitting model output into response fields
//! - [`inference`]: model lifecycle and the generation call
//! - [`server`]: axum router, handlers, metrics

pub mod analysis;
pub mod config;
pub mod inference;
pub mod prompt;
pub mod query;
pub mod samples;
pub mod server;
