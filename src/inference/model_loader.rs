//! GGUF model inspection and backend construction.
//!
//! Verifies the model file is present and derives display metadata
//! (architecture, quantization) from the file name, then builds the
//! configured [`TextGenerator`].

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelConfig;
use crate::inference::generator::{InferenceError, TextGenerator};

/// Quantization tags recognised in GGUF file names, most specific first.
const QUANT_TAGS: &[&str] = &[
    "Q4_K_M", "Q4_K_S", "Q5_K_M", "Q5_K_S", "Q3_K_M", "Q3_K_S", "Q2_K", "Q6_K", "Q8_0",
    "Q4_0", "Q4_1", "Q5_0", "Q5_1", "IQ4_XS", "F16", "BF16", "F32", "Q4", "Q5", "Q8",
];

/// Metadata describing a model file on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// Path the model was loaded from.
    pub path: String,

    /// Model architecture family (e.g., "mixtral", "llama").
    pub architecture: String,

    /// Quantization type string, "unknown" when the name carries none.
    pub quantization: String,

    /// File size in bytes.
    pub file_size: u64,
}

impl ModelMetadata {
    /// File size in GiB, for logs.
    pub fn size_gib(&self) -> f64 {
        self.file_size as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Inspect a GGUF model file.
///
/// Only the file name and size are consulted; the GGUF header is left to the
/// inference library.
pub fn load_metadata(path: &Path) -> Result<ModelMetadata, InferenceError> {
    if !path.is_file() {
        return Err(InferenceError::ModelNotFound(path.display().to_string()));
    }

    let file_size = std::fs::metadata(path)?.len();

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    let metadata = ModelMetadata {
        path: path.display().to_string(),
        architecture: architecture_from_name(&filename).to_string(),
        quantization: quantization_from_name(&filename),
        file_size,
    };

    info!(
        arch = metadata.architecture,
        quant = metadata.quantization,
        size_gib = metadata.size_gib(),
        "Loaded model metadata"
    );

    Ok(metadata)
}

/// Guess the architecture family from a file name.
pub fn architecture_from_name(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.contains("mixtral") {
        "mixtral"
    } else if lower.contains("mistral") {
        "mistral"
    } else if lower.contains("qwen") {
        "qwen2"
    } else if lower.contains("phi") {
        "phi"
    } else if lower.contains("gemma") {
        "gemma"
    } else {
        "llama"
    }
}

/// Extract the quantization tag from a file name.
pub fn quantization_from_name(filename: &str) -> String {
    let upper = filename.to_uppercase();
    QUANT_TAGS
        .iter()
        .find(|tag| {
            upper
                .match_indices(**tag)
                .any(|(i, _)| is_tag_boundary(&upper, i, tag.len()))
        })
        .map(|tag| tag.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_tag_boundary(name: &str, start: usize, len: usize) -> bool {
    let before = name[..start].chars().next_back();
    let after = name[start + len..].chars().next();
    let sep = |c: Option<char>| c.map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_');
    sep(before) && sep(after)
}

/// Build the inference backend for `config`.
///
/// Fails with [`InferenceError::ModelNotFound`] when the file is missing,
/// regardless of backend.
pub fn load_generator(
    config: &ModelConfig,
) -> Result<(Arc<dyn TextGenerator>, ModelMetadata), InferenceError> {
    let metadata = load_metadata(&config.model_path)?;

    #[cfg(feature = "llama")]
    let generator: Arc<dyn TextGenerator> =
        Arc::new(crate::inference::llama::LlamaGenerator::load(config)?);

    #[cfg(not(feature = "llama"))]
    let generator: Arc<dyn TextGenerator> = {
        tracing::warn!("Built without the `llama` feature; serving stub completions");
        Arc::new(crate::inference::generator::StubGenerator::new())
    };

    Ok((generator, metadata))
}
