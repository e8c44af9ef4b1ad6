//! The text-generation seam between the service and the inference library.
//!
//! Every backend implements [`TextGenerator`]: a single blocking call that
//! turns a prompt plus sampling parameters into generated text. The default
//! build ships [`StubGenerator`], which answers deterministically without a
//! native toolchain; the `llama` feature adds the llama.cpp backend.

use thiserror::Error;

use crate::config::SamplingParams;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoadFailed(String),

    #[error("Context creation failed: {0}")]
    ContextFailed(String),

    #[error("Tokenization failed: {0}")]
    TokenizeFailed(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text, without the prompt.
    pub text: String,

    /// Number of prompt tokens.
    pub prompt_tokens: usize,

    /// Number of generated tokens.
    pub completion_tokens: usize,
}

/// A loaded language model.
///
/// `generate` blocks for the whole generation and must be called from a
/// blocking context.
pub trait TextGenerator: Send + Sync {
    /// Name of the inference library, e.g. "llama.cpp".
    fn engine_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Completion, InferenceError>;
}

/// Deterministic stand-in used when the crate is built without `llama`.
///
/// Answers each numbered item the prompt asks for, so downstream parsing
/// sees the same shape a real model produces.
#[derive(Debug, Default, Clone)]
pub struct StubGenerator;

impl StubGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl TextGenerator for StubGenerator {
    fn engine_name(&self) -> &str {
        "stub"
    }

    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Completion, InferenceError> {
        let prompt_tokens = approx_tokens(prompt);

        let mut lines = Vec::new();
        for line in prompt.lines().map(str::trim) {
            let Some((number, rest)) = line.split_once(". ") else {
                continue;
            };
            if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let heading = rest.split(" (").next().unwrap_or(rest).trim();
            lines.push(format!(
                "{number}. {heading}: no analysis available (stub backend, model not executed)."
            ));
        }
        if lines.is_empty() {
            lines.push("No analysis available (stub backend, model not executed).".to_string());
        }

        // Whole lines only, within the token budget.
        let words: Vec<&str> = lines.iter().flat_map(|l| l.split(' ')).collect();
        let text = if words.len() > params.max_tokens {
            let mut kept = 0;
            let mut out = Vec::new();
            for line in &lines {
                let n = line.split(' ').count();
                if kept + n > params.max_tokens {
                    break;
                }
                kept += n;
                out.push(line.as_str());
            }
            out.join("\n")
        } else {
            lines.join("\n")
        };

        let completion_tokens = approx_tokens(&text);
        Ok(Completion {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }
}

/// Rough token estimate: ~1 token per 4 characters.
pub fn approx_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}
