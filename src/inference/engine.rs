//! Inference orchestrator: owns the process-wide model handle and runs
//! generation calls against it.
//!
//! The engine:
//! 1. Tracks the model lifecycle (unloaded → loading → ready | failed)
//! 2. Gates concurrent calls into the backend with a semaphore
//! 3. Runs each blocking generation on tokio's blocking pool
//! 4. Applies the optional timeout and trims output at stop sequences

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::{ModelConfig, SamplingParams, ServerConfig};
use crate::inference::generator::{InferenceError, TextGenerator};
use crate::inference::model_loader::{self, ModelMetadata};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    #[error("Inference timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Inference task failed: {0}")]
    TaskFailed(String),
}

/// A backend that finished loading.
#[derive(Clone)]
pub struct LoadedModel {
    pub generator: Arc<dyn TextGenerator>,
    pub metadata: ModelMetadata,
}

/// Lifecycle of the single model instance.
#[derive(Clone, Default)]
pub enum ModelState {
    #[default]
    Unloaded,
    Loading,
    Ready(LoadedModel),
    Failed(String),
}

/// Point-in-time view of the model state, for health reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStatus {
    /// "healthy", "loading" or "unavailable".
    pub status: &'static str,
    pub loaded: bool,
    pub engine: Option<String>,
    pub metadata: Option<ModelMetadata>,
    pub error: Option<String>,
}

/// Shared handle to the process-wide model.
#[derive(Clone, Default)]
pub struct ModelHandle {
    state: Arc<RwLock<ModelState>>,
}

impl ModelHandle {
    /// A handle with no model loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that is already serving `generator`.
    pub fn ready(generator: Arc<dyn TextGenerator>, metadata: ModelMetadata) -> Self {
        Self {
            state: Arc::new(RwLock::new(ModelState::Ready(LoadedModel {
                generator,
                metadata,
            }))),
        }
    }

    /// Load the configured model on the blocking pool and publish the result.
    pub async fn load(&self, config: ModelConfig) -> Result<(), EngineError> {
        *self.state.write().await = ModelState::Loading;
        info!(model = %config.model_path.display(), "Loading quantized model");

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || model_loader::load_generator(&config))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?;

        match result {
            Ok((generator, metadata)) => {
                info!(
                    engine = generator.engine_name(),
                    quant = metadata.quantization,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded and ready"
                );
                self.set_ready(generator, metadata).await;
                Ok(())
            }
            Err(e) => {
                error!("Model load failed: {e}");
                self.set_failed(e.to_string()).await;
                Err(e.into())
            }
        }
    }

    pub async fn set_loading(&self) {
        *self.state.write().await = ModelState::Loading;
    }

    pub async fn set_ready(&self, generator: Arc<dyn TextGenerator>, metadata: ModelMetadata) {
        *self.state.write().await = ModelState::Ready(LoadedModel {
            generator,
            metadata,
        });
    }

    pub async fn set_failed(&self, reason: String) {
        *self.state.write().await = ModelState::Failed(reason);
    }

    /// Drop the loaded model. In-flight calls keep their own reference.
    pub async fn unload(&self) {
        let previous = std::mem::take(&mut *self.state.write().await);
        if matches!(previous, ModelState::Ready(_)) {
            info!("Model unloaded");
        }
    }

    /// The loaded backend, or why there is none.
    pub async fn loaded(&self) -> Result<LoadedModel, EngineError> {
        match &*self.state.read().await {
            ModelState::Ready(model) => Ok(model.clone()),
            ModelState::Unloaded => Err(EngineError::ModelUnavailable("model not loaded".into())),
            ModelState::Loading => Err(EngineError::ModelUnavailable(
                "model is still loading".into(),
            )),
            ModelState::Failed(reason) => Err(EngineError::ModelUnavailable(reason.clone())),
        }
    }

    pub async fn status(&self) -> ModelStatus {
        match &*self.state.read().await {
            ModelState::Ready(model) => ModelStatus {
                status: "healthy",
                loaded: true,
                engine: Some(model.generator.engine_name().to_string()),
                metadata: Some(model.metadata.clone()),
                error: None,
            },
            ModelState::Loading => ModelStatus {
                status: "loading",
                loaded: false,
                engine: None,
                metadata: None,
                error: None,
            },
            ModelState::Unloaded => ModelStatus {
                status: "unavailable",
                loaded: false,
                engine: None,
                metadata: None,
                error: None,
            },
            ModelState::Failed(reason) => ModelStatus {
                status: "unavailable",
                loaded: false,
                engine: None,
                metadata: None,
                error: Some(reason.clone()),
            },
        }
    }
}

/// A generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Unique request ID.
    pub request_id: String,

    /// Fully rendered prompt.
    pub prompt: String,

    /// Sampling parameters.
    pub params: SamplingParams,
}

/// Result of a finished generation.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Trimmed text, cut at the first stop sequence.
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    /// Time spent inside the backend call.
    pub elapsed: Duration,
}

/// The inference engine.
pub struct InferenceEngine {
    model: ModelHandle,

    /// Bounds concurrent calls into the backend.
    permits: Arc<Semaphore>,

    timeout: Option<Duration>,
}

impl InferenceEngine {
    /// Create an engine over `model` using the server's concurrency and timeout settings.
    pub fn new(model: ModelHandle, config: &ServerConfig) -> Self {
        let timeout = (config.inference_timeout_secs > 0)
            .then(|| Duration::from_secs(config.inference_timeout_secs));
        Self {
            model,
            permits: Arc::new(Semaphore::new(config.max_concurrent_inferences.max(1))),
            timeout,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Run one generation to completion.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, EngineError> {
        let model = self.model.loaded().await?;

        debug!(
            request_id = request.request_id,
            prompt_chars = request.prompt.len(),
            max_tokens = request.params.max_tokens,
            "Starting generation"
        );

        let started = Instant::now();
        let params = request.params.clone();
        let prompt = request.prompt;
        let permits = self.permits.clone();
        let run = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| EngineError::TaskFailed(e.to_string()))?;
            // The permit moves into the blocking task so it is held until the
            // backend returns, even if the caller stops waiting.
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                model.generator.generate(&prompt, &params)
            })
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))
        };

        // The deadline covers the wait for a permit as well as the call.
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(request_id = request.request_id, "Generation timed out");
                    return Err(EngineError::Timeout(limit));
                }
            },
            None => run.await,
        };

        let completion = joined??;
        let elapsed = started.elapsed();

        let text = truncate_at_stop(&completion.text, &request.params.stop)
            .trim()
            .to_string();

        info!(
            request_id = request.request_id,
            completion_tokens = completion.completion_tokens,
            elapsed_ms = elapsed.as_millis() as u64,
            "Generation complete"
        );

        Ok(GenerationOutput {
            text,
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            elapsed,
        })
    }
}

/// Cut `text` at the earliest occurrence of any stop sequence.
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[String]) -> &'a str {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    &text[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::inference::generator::{Completion, StubGenerator};

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            path: "test.gguf".to_string(),
            architecture: "llama".to_string(),
            quantization: "Q4".to_string(),
            file_size: 0,
        }
    }

    struct Fixed(&'static str);

    impl TextGenerator for Fixed {
        fn engine_name(&self) -> &str {
            "fixed"
        }

        fn generate(&self, _: &str, _: &SamplingParams) -> Result<Completion, InferenceError> {
            Ok(Completion {
                text: self.0.to_string(),
                prompt_tokens: 3,
                completion_tokens: 7,
            })
        }
    }

    struct Slow;

    impl TextGenerator for Slow {
        fn engine_name(&self) -> &str {
            "slow"
        }

        fn generate(&self, _: &str, _: &SamplingParams) -> Result<Completion, InferenceError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Completion {
                text: "late".to_string(),
                prompt_tokens: 1,
                completion_tokens: 1,
            })
        }
    }

    /// Sleeps for `delay` and records the most calls seen running at once.
    #[derive(Default)]
    struct Tracking {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TextGenerator for Tracking {
        fn engine_name(&self) -> &str {
            "tracking"
        }

        fn generate(&self, _: &str, _: &SamplingParams) -> Result<Completion, InferenceError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion {
                text: "done".to_string(),
                prompt_tokens: 1,
                completion_tokens: 1,
            })
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            request_id: "test-1".to_string(),
            prompt: "[INST] hi [/INST]".to_string(),
            params: SamplingParams::default(),
        }
    }

    #[test]
    fn test_truncate_at_stop() {
        let stop = vec!["</s>".to_string(), "[INST]".to_string()];
        assert_eq!(truncate_at_stop("answer[INST] more</s>", &stop), "answer");
        assert_eq!(truncate_at_stop("answer</s>[INST]", &stop), "answer");
        assert_eq!(truncate_at_stop("answer", &stop), "answer");
        assert_eq!(truncate_at_stop("answer", &[String::new()]), "answer");
    }

    #[tokio::test]
    async fn test_generate_trims_and_stops() {
        let handle = ModelHandle::ready(Arc::new(Fixed("  Moderate risk.\n</s> junk")), metadata());
        let engine = InferenceEngine::new(handle, &ServerConfig::default());

        let out = engine.generate(request()).await.unwrap();
        assert_eq!(out.text, "Moderate risk.");
        assert_eq!(out.completion_tokens, 7);
    }

    #[tokio::test]
    async fn test_generate_without_model() {
        let engine = InferenceEngine::new(ModelHandle::new(), &ServerConfig::default());
        let err = engine.generate(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let handle = ModelHandle::ready(Arc::new(Slow), metadata());
        let config = ServerConfig {
            inference_timeout_secs: 0,
            ..ServerConfig::default()
        };
        let mut engine = InferenceEngine::new(handle, &config);
        engine.timeout = Some(Duration::from_millis(20));

        let err = engine.generate(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_calls_are_serialized() {
        let generator = Arc::new(Tracking {
            delay: Duration::from_millis(50),
            ..Tracking::default()
        });
        let handle = ModelHandle::ready(generator.clone(), metadata());
        let engine = InferenceEngine::new(handle, &ServerConfig::default());

        let (a, b, c) = tokio::join!(
            engine.generate(request()),
            engine.generate(request()),
            engine.generate(request())
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(generator.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_covers_queued_request() {
        let generator = Arc::new(Tracking {
            delay: Duration::from_millis(800),
            ..Tracking::default()
        });
        let handle = ModelHandle::ready(generator, metadata());
        let mut engine = InferenceEngine::new(handle, &ServerConfig::default());
        engine.timeout = Some(Duration::from_millis(100));

        // The first call times out but its backend call keeps the only permit.
        let err = engine.generate(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));

        let started = Instant::now();
        let err = engine.generate(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_lifecycle_status() {
        let handle = ModelHandle::new();
        assert_eq!(handle.status().await.status, "unavailable");

        handle.set_loading().await;
        assert_eq!(handle.status().await.status, "loading");

        handle
            .set_ready(Arc::new(StubGenerator::new()), metadata())
            .await;
        let status = handle.status().await;
        assert!(status.loaded);
        assert_eq!(status.engine.as_deref(), Some("stub"));

        handle.unload().await;
        assert!(!handle.status().await.loaded);
    }

    #[tokio::test]
    async fn test_load_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ModelHandle::new();
        let config = ModelConfig {
            model_path: dir.path().join("absent.gguf"),
            ..ModelConfig::default()
        };

        assert!(handle.load(config).await.is_err());
        let status = handle.status().await;
        assert_eq!(status.status, "unavailable");
        assert!(status.error.unwrap().contains("absent.gguf"));
    }
}
