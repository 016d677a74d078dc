//! Model request/response logging
//!
//! Set the `LLM_LOG_FILE` environment variable to append one JSON line per
//! generation to that file.
//!
//! Example: `LLM_LOG_FILE=/tmp/llm.log bob ask "hello"`

use serde_json::json;
use std::io::Write;
use tracing::{debug, warn};

use super::GenerationRequest;

/// Environment variable naming the log file
pub const LOG_FILE_ENV: &str = "LLM_LOG_FILE";

/// What to include in one log entry
pub struct LogConfig<'a> {
    /// Backend name ("llama_server", "genai")
    pub backend: &'a str,
    pub model: &'a str,
    pub request: &'a GenerationRequest,
    pub output: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Append the interaction to the log file if `LLM_LOG_FILE` is set
pub fn log_llm_interaction(config: LogConfig<'_>) {
    let Ok(log_file) = std::env::var(LOG_FILE_ENV) else {
        return;
    };
    write_entry(&log_file, &config);
}

fn write_entry(log_file: &str, config: &LogConfig<'_>) {
    let entry = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "backend": config.backend,
        "model": config.model,
        "request": {
            "prompt": config.request.prompt,
            "prompt_chars": config.request.prompt.chars().count(),
            "max_tokens": config.request.max_tokens,
            "temperature": config.request.temperature,
            "stop": config.request.stop,
        },
        "response": config.output,
        "error": config.error,
    });

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
    {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", entry) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", log_file, e);
        }
    }

    debug!("Logged LLM interaction to {}", log_file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_entry_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.log");
        let path_str = path.to_str().unwrap();
        let request = GenerationRequest::new("What's 2+2?", 32, 0.2);

        for output in ["4", "four"] {
            write_entry(
                path_str,
                &LogConfig {
                    backend: "llama_server",
                    model: "test",
                    request: &request,
                    output: Some(output),
                    error: None,
                },
            );
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["request"]["prompt"], "What's 2+2?");
        assert_eq!(first["request"]["max_tokens"], 32);
        assert_eq!(first["response"], "4");
        assert!(first["error"].is_null());
    }
}
