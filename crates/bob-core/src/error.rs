//! Error types for Bob Core

use thiserror::Error;

/// Result type alias using Bob Error
pub type Result<T> = std::result::Result<T, Error>;

/// Bob error types
#[derive(Error, Debug)]
pub enum Error {
    /// The generation backend failed to produce output
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Allow-list error: {0}")]
    AllowList(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::AllowList(e.to_string())
    }
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Short machine-readable label used in tool result markers
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "unknown_tool",
            ToolError::InvalidParams(_) => "invalid_params",
            ToolError::ExecutionFailed(_) => "execution_failed",
            ToolError::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        ToolError::ExecutionFailed(e.to_string())
    }
}

impl From<Error> for ToolError {
    fn from(e: Error) -> Self {
        match e {
            Error::Tool(inner) => inner,
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}
