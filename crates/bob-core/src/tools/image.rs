//! generate_image tool - text-to-image through Hugging Face inference
//!
//! The image is written to the configured output directory and returned as a
//! tool artifact so the responder can attach it to the reply.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::ToolError;
use crate::tools::{str_param, BoxFuture, Tool, ToolOutput};

/// Generates an image and saves it as PNG
pub struct GenerateImage {
    config: ImageConfig,
    api_token: String,
    output_dir: PathBuf,
}

impl GenerateImage {
    pub fn new(config: ImageConfig, api_token: impl Into<String>) -> Self {
        let output_dir = config.output_dir();
        Self {
            config,
            api_token: api_token.into(),
            output_dir,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    async fn request_image(&self, prompt: &str) -> Result<Vec<u8>, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        debug!(model = %self.config.model, "Requesting image");

        let response = client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Accept", "image/png")
            .json(&json!({
                "inputs": prompt,
                "parameters": {
                    "width": self.config.width,
                    "height": self.config.height,
                },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ToolError::ExecutionFailed(format!(
                "image API returned {}: {}",
                status, snippet
            )));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!(
                "image API returned no image: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Timestamped file name built from the first words of the prompt
pub fn image_filename(prompt: &str, stamp: &str) -> String {
    let safe: String = prompt
        .chars()
        .take(30)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe = safe.trim_end().replace(' ', "_");
    if safe.is_empty() {
        format!("generated_image_{}.png", stamp)
    } else {
        format!("generated_image_{}_{}.png", stamp, safe)
    }
}

impl Tool for GenerateImage {
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let prompt = str_param(&params, "prompt")?;
            let bytes = self.request_image(prompt).await?;

            tokio::fs::create_dir_all(&self.output_dir).await?;
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            let filename = image_filename(prompt, &stamp);
            let path = self.output_dir.join(&filename);
            tokio::fs::write(&path, &bytes).await?;

            info!(path = %path.display(), bytes = bytes.len(), "Image generated");
            Ok(ToolOutput::text(format!(
                "Image generated and saved as {}. Refer to it as [image: {}].",
                filename, filename
            ))
            .with_artifact(path))
        })
    }
}
