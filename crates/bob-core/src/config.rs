//! Configuration management for Bob
//!
//! Handles loading and saving the TOML configuration file. Secrets are
//! never stored in the file by default; each section names the environment
//! variable that holds its credential.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language model backend settings
    #[serde(default)]
    pub model: ModelConfig,
    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Mailbox settings
    #[serde(default)]
    pub mail: MailConfig,
    /// Approved-sender storage
    #[serde(default)]
    pub allow_list: AllowListConfig,
    /// Moltbook social platform
    #[serde(default)]
    pub moltbook: MoltbookConfig,
    /// Web search tool
    #[serde(default)]
    pub web_search: WebSearchConfig,
    /// Image generation tool
    #[serde(default)]
    pub image: ImageConfig,
}

/// Read a non-empty secret from the named environment variable
fn env_secret(env_name: &str) -> Option<String> {
    std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
}

/// Which generation backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelBackend {
    /// llama.cpp server raw completion endpoint
    LlamaServer,
    /// genai chat client (Ollama and hosted providers)
    Genai,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: ModelBackend,
    /// Base URL of the local inference server
    pub base_url: String,
    /// Model name (used by the genai backend)
    pub model: String,
    /// Context window of the model, in tokens
    pub context_window: usize,
    /// Per-call generation cap
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::LlamaServer,
            base_url: "http://127.0.0.1:8080".to_string(),
            model: "phi3:mini".to_string(),
            context_window: 4096,
            max_tokens: 512,
            temperature: 0.7,
            stop: vec!["User:".to_string()],
            timeout_secs: 300,
        }
    }
}

/// Orchestration loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Disable to answer with a single model call and no tool phase
    pub tools_enabled: bool,
    /// Maximum number of tool-dispatch iterations per run
    pub max_iterations: usize,
    /// Maximum tool calls honoured from a single model response
    pub max_calls_per_turn: usize,
    /// Characters-per-token ratio used for context estimates
    pub chars_per_token: usize,
    /// Tokens kept free in the context window for the model's answer
    pub reserved_response_tokens: usize,
    /// Upper bound for the running history summary
    pub summary_max_tokens: usize,
    /// Leading envelope marker of a reply
    pub salutation: Option<String>,
    /// Trailing envelope marker of a reply
    pub signature: Option<String>,
    /// Returned when the model cannot produce output
    pub apology: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tools_enabled: true,
            max_iterations: 5,
            max_calls_per_turn: 5,
            chars_per_token: 4,
            reserved_response_tokens: 512,
            summary_max_tokens: 256,
            salutation: Some("Dear".to_string()),
            signature: Some("Bob the Raspberry Pi".to_string()),
            apology: "I'm sorry, I wasn't able to come up with a response this time. \
                      Please try again later."
                .to_string(),
        }
    }
}

/// Mailbox configuration (IMAP polling, SMTP sending)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// The bot's own address, also the login user
    pub address: String,
    pub password_env: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub poll_interval_secs: u64,
    /// Env var holding the phrase that admits unknown senders
    pub approved_phrase_env: String,
    /// Where failures of the daemon are reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
    /// Directory for saved inbound image attachments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments_dir: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            password_env: "GMAIL_APP_PASSWORD".to_string(),
            imap_host: "imap.gmail.com".to_string(),
            imap_port: 993,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            poll_interval_secs: 900,
            approved_phrase_env: "APPROVED_PHRASE".to_string(),
            admin_email: None,
            attachments_dir: None,
        }
    }
}

impl MailConfig {
    pub fn password(&self) -> Option<String> {
        env_secret(&self.password_env)
    }

    pub fn approved_phrase(&self) -> Option<String> {
        env_secret(&self.approved_phrase_env)
    }

    /// Whether enough is configured to talk to the mail servers
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && self.password().is_some()
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.attachments_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("email_attachments"))
    }
}

/// Allow-list storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListConfig {
    pub database: PathBuf,
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("bob.db"),
        }
    }
}

/// Moltbook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoltbookConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Chance of browsing after each inbox poll
    pub browse_probability: f64,
}

impl Default for MoltbookConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.moltbook.com/api/v1".to_string(),
            api_key_env: "MOLTBOOK_API_KEY".to_string(),
            browse_probability: 0.2,
        }
    }
}

impl MoltbookConfig {
    pub fn get_api_key(&self) -> Option<String> {
        env_secret(&self.api_key_env)
    }
}

/// Web search configuration (SerpAPI)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub api_key_env: String,
    pub max_results: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "SERPAPI_API_KEY".to_string(),
            max_results: 3,
        }
    }
}

impl WebSearchConfig {
    pub fn get_api_key(&self) -> Option<String> {
        env_secret(&self.api_key_env)
    }
}

/// Image generation configuration (Hugging Face inference)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub api_token_env: String,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_token_env: "HF_API_TOKEN".to_string(),
            model: "black-forest-labs/FLUX.1-schnell".to_string(),
            base_url: "https://router.huggingface.co/hf-inference/models".to_string(),
            output_dir: None,
            width: 512,
            height: 512,
        }
    }
}

impl ImageConfig {
    pub fn get_api_token(&self) -> Option<String> {
        env_secret(&self.api_token_env)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("generated_images"))
    }
}

/// Per-user data directory for Bob's files
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bob")
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("bob").join("config.toml"))
    }

    /// Load configuration from a file
    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.backend, ModelBackend::LlamaServer);
        assert_eq!(config.model.stop, vec!["User:".to_string()]);
        assert!(config.agent.tools_enabled);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.max_calls_per_turn, 5);
        assert_eq!(config.agent.chars_per_token, 4);
        assert_eq!(config.mail.poll_interval_secs, 900);
        assert!((config.moltbook.browse_probability - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("backend = \"llama_server\""));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
        assert_eq!(parsed.model.base_url, config.model.base_url);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[agent]
max_iterations = 3

[model]
backend = "genai"
model = "llama3.2"
"#,
        )
        .unwrap();

        assert_eq!(parsed.agent.max_iterations, 3);
        assert_eq!(parsed.agent.max_calls_per_turn, 5);
        assert_eq!(parsed.model.backend, ModelBackend::Genai);
        assert_eq!(parsed.model.context_window, 4096);
        assert_eq!(parsed.mail.imap_host, "imap.gmail.com");
    }

    #[test]
    fn test_config_manager_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(manager.config().agent.max_iterations, 5);
    }

    #[test]
    fn test_config_manager_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path.clone()).unwrap();
        manager.save().unwrap();
        assert!(path.exists());

        let reloaded = ConfigManager::with_path(path).unwrap();
        assert_eq!(reloaded.config().model.max_tokens, 512);
    }

    #[test]
    fn test_secret_from_env() {
        let config = WebSearchConfig {
            api_key_env: "BOB_TEST_SERPAPI_KEY_12345".to_string(),
            ..Default::default()
        };
        assert!(config.get_api_key().is_none());

        unsafe { std::env::set_var("BOB_TEST_SERPAPI_KEY_12345", "test-key") };
        assert_eq!(config.get_api_key(), Some("test-key".to_string()));
        unsafe { std::env::remove_var("BOB_TEST_SERPAPI_KEY_12345") };
    }
}
