//! llama.cpp backend via `llama-cpp-2`.
//!
//! The model is loaded once; each call creates a fresh context, prefills the
//! prompt in batch-sized chunks and samples until EOG, the token budget, or a
//! stop sequence.

use std::num::NonZeroU32;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use tracing::{debug, info};

use crate::config::{ModelConfig, SamplingParams};
use crate::inference::generator::{Completion, InferenceError, TextGenerator};

/// Window of recent tokens the repeat penalty looks at.
const PENALTY_LAST_N: i32 = 64;

/// Fixed sampling seed.
const SEED: u32 = 1234;

pub struct LlamaGenerator {
    backend: LlamaBackend,
    model: LlamaModel,
    n_ctx: u32,
    n_batch: u32,
    n_threads: i32,
}

impl LlamaGenerator {
    /// Load a GGUF model and offload `n_gpu_layers` layers (-1 = all).
    pub fn load(config: &ModelConfig) -> Result<Self, InferenceError> {
        let backend =
            LlamaBackend::init().map_err(|e| InferenceError::ModelLoadFailed(e.to_string()))?;

        let n_gpu_layers = u32::try_from(config.n_gpu_layers).unwrap_or(u32::MAX);
        let model_params = LlamaModelParams::default().with_n_gpu_layers(n_gpu_layers);

        let model = LlamaModel::load_from_file(&backend, &config.model_path, &model_params)
            .map_err(|e| InferenceError::ModelLoadFailed(e.to_string()))?;

        info!(
            path = %config.model_path.display(),
            n_gpu_layers = config.n_gpu_layers,
            n_ctx = config.context_size,
            "llama.cpp model loaded"
        );

        Ok(Self {
            backend,
            model,
            n_ctx: config.context_size,
            n_batch: config.batch_size.max(1),
            n_threads: config.n_threads.max(1) as i32,
        })
    }

    fn sampler(params: &SamplingParams) -> LlamaSampler {
        if params.temperature <= 0.0 {
            return LlamaSampler::chain_simple([
                LlamaSampler::penalties(PENALTY_LAST_N, params.repeat_penalty, 0.0, 0.0),
                LlamaSampler::greedy(),
            ]);
        }
        LlamaSampler::chain_simple([
            LlamaSampler::penalties(PENALTY_LAST_N, params.repeat_penalty, 0.0, 0.0),
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(SEED),
        ])
    }
}

impl TextGenerator for LlamaGenerator {
    fn engine_name(&self) -> &str {
        "llama.cpp"
    }

    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Completion, InferenceError> {
        let n_ctx = NonZeroU32::new(self.n_ctx)
            .or(NonZeroU32::new(2048))
            .ok_or_else(|| InferenceError::ContextFailed("invalid context size".into()))?;

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_batch(self.n_batch)
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);

        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| InferenceError::ContextFailed(e.to_string()))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| InferenceError::TokenizeFailed(e.to_string()))?;

        let n_prompt = tokens.len();
        if n_prompt + params.max_tokens > self.n_ctx as usize {
            debug!(
                n_prompt,
                max_tokens = params.max_tokens,
                n_ctx = self.n_ctx,
                "Prompt plus budget exceeds context; generation may stop early"
            );
        }

        // Prefill in chunks no larger than the batch size.
        let chunk_size = self.n_batch as usize;
        let mut batch = LlamaBatch::new(chunk_size, 1);
        let last_pos = (n_prompt as i32).saturating_sub(1);
        let mut pos = 0i32;
        for chunk in tokens.chunks(chunk_size) {
            batch.clear();
            for (j, &token) in chunk.iter().enumerate() {
                let p = pos + j as i32;
                batch
                    .add(token, p, &[0], p == last_pos)
                    .map_err(|e| InferenceError::DecodeFailed(e.to_string()))?;
            }
            ctx.decode(&mut batch)
                .map_err(|e| InferenceError::DecodeFailed(e.to_string()))?;
            pos += chunk.len() as i32;
        }

        let mut sampler = Self::sampler(params);
        // Raw bytes, since one character can span several tokens.
        let mut bytes: Vec<u8> = Vec::new();
        let mut n_cur = n_prompt as i32;
        let mut generated = 0usize;

        while generated < params.max_tokens && (n_cur as u32) < self.n_ctx {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                break;
            }

            match self.model.token_to_bytes(token, Special::Tokenize) {
                Ok(piece) => bytes.extend_from_slice(&piece),
                Err(e) => debug!(token = token.0, "Skipping undecodable token: {e}"),
            }
            generated += 1;

            let text = decode_pieces(&bytes);
            if params.stop.iter().any(|s| text.contains(s.as_str())) {
                break;
            }

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| InferenceError::DecodeFailed(e.to_string()))?;
            n_cur += 1;

            ctx.decode(&mut batch)
                .map_err(|e| InferenceError::DecodeFailed(e.to_string()))?;
        }

        let output = decode_pieces(&bytes).into_owned();

        Ok(Completion {
            text: output,
            prompt_tokens: n_prompt,
            completion_tokens: generated,
        })
    }
}

/// Decode accumulated token bytes; invalid sequences become U+FFFD.
fn decode_pieces(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_character_split_across_tokens() {
        // "Sérum" with the two bytes of 'é' in separate pieces.
        let pieces: [&[u8]; 3] = [b"S\xc3", b"\xa9", b"rum"];
        let mut bytes = Vec::new();
        for piece in pieces {
            bytes.extend_from_slice(piece);
        }
        assert_eq!(decode_pieces(&bytes), "Sérum");
    }
}
