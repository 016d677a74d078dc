//! Language model providers
//!
//! The orchestration core only needs one operation from a model: turn a
//! prompt into text. [`TextGenerator`] is that seam. Two backends are
//! provided:
//! - [`LlamaServerGenerator`] - raw completion against a llama.cpp server
//! - [`GenAIGenerator`] - chat completion through genai (Ollama and hosted providers)

mod genai_provider;
mod llama_server;
mod logging;

pub use genai_provider::GenAIGenerator;
pub use llama_server::LlamaServerGenerator;
pub use logging::{log_llm_interaction, LogConfig, LOG_FILE_ENV};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ModelBackend, ModelConfig};
use crate::error::Result;

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Generation stops before any of these sequences
    pub stop: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// Text generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Characters the backend adds around every prompt before sending it
    fn prompt_framing_chars(&self) -> usize {
        0
    }

    /// Generate text for the prompt. Failures are [`crate::Error::Provider`].
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Create the generator selected by the model configuration
pub fn create_generator(config: &ModelConfig) -> Result<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = match config.backend {
        ModelBackend::LlamaServer => Arc::new(LlamaServerGenerator::from_config(config)?),
        ModelBackend::Genai => Arc::new(GenAIGenerator::from_config(config)),
    };
    info!(backend = generator.name(), "Model backend ready");
    Ok(generator)
}
