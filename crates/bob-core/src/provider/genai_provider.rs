//! GenAI-based backend
//!
//! Sends the prompt as a single user message through the genai client and
//! streams the answer back, which avoids idle timeouts on slow local models.
//! Model names are resolved by genai: unprefixed local names such as
//! `phi3:mini` go to Ollama, hosted models pick up their API key from the
//! usual environment variables.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use genai::{Client, WebConfig};
use tracing::{debug, error};

use crate::config::ModelConfig;
use crate::error::{Error, Result};

use super::logging::{log_llm_interaction, LogConfig};
use super::{GenerationRequest, TextGenerator};

/// Chat-completion backend built on genai
pub struct GenAIGenerator {
    client: Client,
    model: String,
}

impl GenAIGenerator {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        let web_config = WebConfig::default()
            .with_timeout(timeout)
            .with_connect_timeout(Duration::from_secs(30));
        let client = Client::builder().with_web_config(web_config).build();
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.model, Duration::from_secs(config.timeout_secs))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn stream_completion(&self, request: &GenerationRequest) -> Result<String> {
        let chat_req = ChatRequest::default().append_message(ChatMessage::user(request.prompt.clone()));

        let mut options = ChatOptions::default()
            .with_max_tokens(request.max_tokens)
            .with_temperature(request.temperature as f64);
        if !request.stop.is_empty() {
            options = options.with_stop_sequences(request.stop.clone());
        }

        let stream_response = self
            .client
            .exec_chat_stream(&self.model, chat_req, Some(&options))
            .await
            .map_err(|e| Error::Provider(format!("GenAI error: {}", e)))?;

        let mut content = String::new();
        let mut stream = stream_response.stream;
        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => content.push_str(&chunk.content),
                Ok(ChatStreamEvent::End(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    error!(error = ?e, model = %self.model, "LLM stream error");
                    return Err(Error::Provider(format!("GenAI stream error: {:?}", e)));
                }
            }
        }

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for GenAIGenerator {
    fn name(&self) -> &str {
        "genai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(model = %self.model, max_tokens = request.max_tokens, "Calling genai");
        let result = self.stream_completion(request).await;

        let error = result.as_ref().err().map(|e| e.to_string());
        log_llm_interaction(LogConfig {
            backend: self.name(),
            model: &self.model,
            request,
            output: result.as_ref().ok().map(String::as_str),
            error: error.as_deref(),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_model_name() {
        let config = ModelConfig {
            model: "llama3.2".to_string(),
            ..ModelConfig::default()
        };
        assert_eq!(GenAIGenerator::from_config(&config).model(), "llama3.2");
    }
}
