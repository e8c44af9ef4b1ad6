//! LLM inference layer.
//!
//! - [`generator`]: The `TextGenerator` seam and the built-in stub backend
//! - [`llama`]: llama.cpp backend (behind the `llama` feature)
//! - [`model_loader`]: GGUF file inspection and backend construction
//! - [`engine`]: Process-wide model handle and the gated inference call

pub mod engine;
pub mod generator;
#[cfg(feature = "llama")]
pub mod llama;
pub mod model_loader;
