//! Runtime configuration for drug-interaction-api.
//!
//! Configuration is loaded from a JSON file (missing fields fall back to
//! defaults) and then overridden by command-line flags and environment
//! variables. Model, sampling and frontend knobs all live here.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "drug-interaction-api",
    about = "Drug interaction analysis server backed by a quantized LLM"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides `server.listen`).
    #[arg(long)]
    pub listen: Option<String>,

    /// Path to the GGUF model file.
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Directory holding the static frontend.
    #[arg(long, env = "FRONTEND_DIR")]
    pub frontend_dir: Option<PathBuf>,

    /// Host address shown in the startup banner.
    #[arg(long, env = "HOST_IP")]
    pub host_ip: Option<String>,

    /// Number of CPU threads used for inference.
    #[arg(long, env = "OMP_NUM_THREADS")]
    pub threads: Option<u32>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Model configuration.
    pub model: ModelConfig,

    /// Sampling presets per query kind.
    pub generation: GenerationConfig,

    /// Static frontend settings.
    pub frontend: FrontendConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8000").
    pub listen: String,

    /// Host shown in the startup banner; empty means "localhost".
    pub host_ip: String,

    /// Maximum number of inference calls running at once.
    pub max_concurrent_inferences: usize,

    /// Inference timeout in seconds (0 = wait indefinitely).
    pub inference_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            host_ip: String::new(),
            max_concurrent_inferences: 1,
            inference_timeout_secs: 0,
        }
    }
}

/// Model-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the GGUF model file.
    pub model_path: PathBuf,

    /// Human-readable model description reported by the health endpoint.
    pub model_type: String,

    /// Number of GPU layers to offload (-1 = all).
    pub n_gpu_layers: i32,

    /// Context size in tokens.
    pub context_size: u32,

    /// Batch size for prompt processing.
    pub batch_size: u32,

    /// Number of CPU threads.
    pub n_threads: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("/app/models/medical-mixtral-q4.gguf"),
            model_type: "Fine-tuned Mixtral Medical (Quantized Q4)".to_string(),
            n_gpu_layers: -1,
            context_size: 2048,
            batch_size: 512,
            n_threads: 8,
        }
    }
}

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Maximum tokens to generate.
    pub max_tokens: usize,

    /// Temperature for sampling (0.0 = greedy).
    pub temperature: f32,

    /// Top-p (nucleus) sampling threshold.
    pub top_p: f32,

    /// Penalty applied to recently generated tokens.
    pub repeat_penalty: f32,

    /// Generation stops at the first occurrence of any of these strings.
    pub stop: Vec<String>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
            stop: vec!["</s>".to_string(), "[INST]".to_string()],
        }
    }
}

/// Sampling presets for the two query kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Two-drug interaction queries.
    pub simple: SamplingParams,

    /// Multi-drug patient cases.
    pub complex: SamplingParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            simple: SamplingParams::default(),
            complex: SamplingParams {
                max_tokens: 400,
                ..SamplingParams::default()
            },
        }
    }
}

/// Static frontend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directory containing `index.html` and its assets.
    pub dir: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/app/frontend"),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line and environment overrides on top of the file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(host_ip) = &cli.host_ip {
            self.server.host_ip = host_ip.clone();
        }
        if let Some(path) = &cli.model_path {
            self.model.model_path = path.clone();
        }
        if let Some(dir) = &cli.frontend_dir {
            self.frontend.dir = dir.clone();
        }
        if let Some(threads) = cli.threads {
            self.model.n_threads = threads;
        }
    }

    /// Port component of the listen address, if it parses.
    pub fn listen_port(&self) -> Option<u16> {
        self.server
            .listen
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }

    /// Base URL shown to users in the startup banner.
    pub fn display_url(&self) -> String {
        let host = if self.server.host_ip.is_empty() {
            "localhost"
        } else {
            self.server.host_ip.as_str()
        };
        match self.listen_port() {
            Some(port) => format!("http://{host}:{port}"),
            None => format!("http://{host}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.server.listen, "0.0.0.0:8000");
        assert_eq!(cfg.model.context_size, 2048);
        assert_eq!(cfg.generation.simple.max_tokens, 512);
        assert_eq!(cfg.generation.complex.max_tokens, 400);
        assert_eq!(cfg.generation.complex.stop, vec!["</s>", "[INST]"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model": {{"model_path": "/models/x.gguf"}}, "generation": {{"complex": {{"max_tokens": 64}}}}}}"#
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.model.model_path, PathBuf::from("/models/x.gguf"));
        assert_eq!(cfg.model.n_gpu_layers, -1);
        assert_eq!(cfg.generation.complex.max_tokens, 64);
        assert_eq!(cfg.generation.complex.temperature, 0.7);
        assert_eq!(cfg.server.max_concurrent_inferences, 1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg.server.listen, "0.0.0.0:8000");
    }

    #[test]
    fn test_cli_overrides() {
        let mut cfg = Config::default();
        let cli = Cli {
            listen: Some("127.0.0.1:9000".to_string()),
            host_ip: Some("10.0.0.5".to_string()),
            threads: Some(2),
            ..Cli::default()
        };
        cfg.apply_cli(&cli);

        assert_eq!(cfg.model.n_threads, 2);
        assert_eq!(cfg.display_url(), "http://10.0.0.5:9000");
    }

    #[test]
    fn test_display_url_defaults_to_localhost() {
        assert_eq!(Config::default().display_url(), "http://localhost:8000");
    }
}
