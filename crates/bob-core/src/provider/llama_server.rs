//! llama.cpp server backend
//!
//! Uses the raw `/completion` endpoint so the prompt text reaches the model
//! exactly as built, framed as a single user turn.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{Error, Result};

use super::logging::{log_llm_interaction, LogConfig};
use super::{GenerationRequest, TextGenerator};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: String,
}

/// Raw-completion client for a local llama.cpp server
pub struct LlamaServerGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl LlamaServerGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/completion", self.base_url);
        let body = json!({
            "prompt": frame_prompt(&request.prompt),
            "n_predict": request.max_tokens,
            "temperature": request.temperature,
            "stop": request.stop,
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("llama server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "llama server returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("invalid llama server response: {}", e)))?;
        Ok(parsed.content.trim().to_string())
    }
}

const FRAME_OPEN: &str = "User: ";
const FRAME_CLOSE: &str = "\nAssistant: ";

/// Frame the prompt as one user turn awaiting the assistant
pub fn frame_prompt(prompt: &str) -> String {
    format!("{}{}{}", FRAME_OPEN, prompt, FRAME_CLOSE)
}

#[async_trait]
impl TextGenerator for LlamaServerGenerator {
    fn name(&self) -> &str {
        "llama_server"
    }

    fn prompt_framing_chars(&self) -> usize {
        FRAME_OPEN.chars().count() + FRAME_CLOSE.chars().count()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            prompt_chars = request.prompt.len(),
            max_tokens = request.max_tokens,
            "Calling llama server"
        );
        let result = self.complete(request).await;

        let error = result.as_ref().err().map(|e| e.to_string());
        log_llm_interaction(LogConfig {
            backend: self.name(),
            model: &self.base_url,
            request,
            output: result.as_ref().ok().map(String::as_str),
            error: error.as_deref(),
        });

        result
    }
}
