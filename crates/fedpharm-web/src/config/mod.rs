//! Configuration loading for FedPharm-X.
//! Reads fedpharm.toml from the current directory or the path in the
//! FEDPHARM_CONFIG env var. A missing file falls back to defaults.

use std::path::Path;
use std::sync::Arc;

use fedpharm_llm::backend::{DisabledBackend, GeminiBackend, LlmBackend, OllamaBackend};
use fedpharm_llm::{AudioFormat, IntelligenceService};
use fedpharm_sim::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// `[simulation]`, `[upload]` and `[activity]` tables.
    #[serde(flatten)]
    pub session: SessionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "127.0.0.1:3001".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "gemini" | "ollama" | "none"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_backend()       -> String { "gemini".to_string() }
fn default_text_model()    -> String { "gemini-2.5-flash".to_string() }
fn default_summary_model() -> String { "gemini-2.5-pro".to_string() }
fn default_tts_model()     -> String { "gemini-2.5-flash-preview-tts".to_string() }
fn default_voice()         -> String { "Kore".to_string() }
fn default_ollama_url()    -> String { "http://localhost:11434".to_string() }
fn default_ollama_model()  -> String { "llama3:8b".to_string() }
fn default_sample_rate()   -> u32    { 24_000 }
fn default_channels()      -> u16    { 1 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_key: String::new(),
            text_model: default_text_model(),
            summary_model: default_summary_model(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl LlmConfig {
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat { sample_rate: self.sample_rate, channels: self.channels }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.backend.as_str(), "gemini" | "ollama" | "none") {
            anyhow::bail!("llm.backend must be one of gemini, ollama, none (got '{}')", self.backend);
        }
        if self.sample_rate == 0 || self.channels == 0 {
            anyhow::bail!("llm.sample_rate and llm.channels must be non-zero");
        }
        Ok(())
    }

    /// Build the intelligence service for the configured backend. Gemini
    /// without an API key degrades to the disabled backend.
    pub fn build_service(&self) -> IntelligenceService {
        let (backend, summary_model): (Arc<dyn LlmBackend>, Option<String>) = match self.backend.as_str() {
            "gemini" => {
                let key = if self.api_key.is_empty() {
                    std::env::var("FEDPHARM_GEMINI_API_KEY").unwrap_or_default()
                } else {
                    self.api_key.clone()
                };
                if key.is_empty() {
                    warn!("Gemini configured but no API key found (set llm.api_key or FEDPHARM_GEMINI_API_KEY); remote intelligence disabled");
                    (Arc::new(DisabledBackend), None)
                } else {
                    let gemini = GeminiBackend::new(key, &self.text_model)
                        .with_tts(&self.tts_model, &self.voice);
                    (Arc::new(gemini), Some(self.summary_model.clone()))
                }
            }
            "ollama" => (Arc::new(OllamaBackend::new(&self.ollama_url, &self.ollama_model)), None),
            _ => (Arc::new(DisabledBackend), None),
        };
        info!(backend = %self.backend, model = backend.model_id(), "Intelligence backend ready");

        IntelligenceService::new(backend)
            .with_audio_format(self.audio_format())
            .with_summary_model(summary_model)
    }
}


impl AppConfig {
    /// Load configuration from fedpharm.toml.
    /// Checks FEDPHARM_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("FEDPHARM_CONFIG")
            .unwrap_or_else(|_| "fedpharm.toml".to_string());

        if !Path::new(&path).exists() {
            warn!("Config file not found: {}; using built-in defaults", path);
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.session.validate()?;
        self.llm.validate()?;
        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow::anyhow!("server.bind '{}' is not a socket address: {e}", self.server.bind))?;
        Ok(())
    }
}
