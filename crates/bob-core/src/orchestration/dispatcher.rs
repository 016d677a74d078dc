//! Tool dispatch
//!
//! Resolves parsed calls against the registry, validates required
//! parameters, runs the capability and turns every outcome into a
//! [`ToolResult`]. Failures never propagate: the model sees an error result
//! and the run carries on.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::tools::ToolRegistry;

use super::parser::ToolCall;

/// Prefix marking a failed tool result in prompts
pub const ERROR_MARKER: &str = "ERROR:";

/// Outcome of one dispatched call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Failed with the given error kind, e.g. `unknown_tool`
    Failed(&'static str),
    /// Skipped because the same call already ran in this run
    Duplicate,
}

/// Result of one tool call, as handed back to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool: String,
    pub status: ToolStatus,
    pub content: String,
    pub artifacts: Vec<PathBuf>,
}

impl ToolResult {
    fn success(tool: &str, content: String, artifacts: Vec<PathBuf>) -> Self {
        Self {
            tool: tool.to_string(),
            status: ToolStatus::Success,
            content,
            artifacts,
        }
    }

    fn failure(tool: &str, error: &ToolError) -> Self {
        Self {
            tool: tool.to_string(),
            status: ToolStatus::Failed(error.kind()),
            content: format!("{} {}: {}", ERROR_MARKER, error.kind(), error),
            artifacts: Vec::new(),
        }
    }

    fn duplicate(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            status: ToolStatus::Duplicate,
            content: "Skipped: this exact call was already made earlier. Use the result you already have."
                .to_string(),
            artifacts: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ToolStatus::Failed(_))
    }

    pub fn is_duplicate(&self) -> bool {
        self.status == ToolStatus::Duplicate
    }

    /// Text block for the next prompt
    pub fn to_prompt_text(&self) -> String {
        format!("[{}] {}", self.tool, self.content)
    }
}

/// Identity of a call: tool name plus canonical parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallFingerprint([u8; 32]);

impl CallFingerprint {
    pub fn of(call: &ToolCall) -> Self {
        let mut canonical = String::new();
        write_canonical(&call.params_value(), &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(call.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for CallFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// JSON with object keys sorted, so key order does not change identity
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Fingerprints of calls that already succeeded in one run
#[derive(Debug, Clone, Default)]
pub struct DedupMemo {
    seen: HashSet<CallFingerprint>,
}

impl DedupMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, call: &ToolCall) -> bool {
        self.seen.contains(&CallFingerprint::of(call))
    }

    /// Returns false if the call was already recorded
    pub fn record(&mut self, call: &ToolCall) -> bool {
        self.seen.insert(CallFingerprint::of(call))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Executes tool calls against a shared registry
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one call. Only successful calls are recorded in `memo`, so a
    /// failed call may be retried.
    pub async fn dispatch(&self, call: &ToolCall, memo: &mut DedupMemo) -> ToolResult {
        if memo.contains(call) {
            info!(tool = %call.name, fingerprint = %CallFingerprint::of(call), "Skipping duplicate tool call");
            return ToolResult::duplicate(&call.name);
        }

        let Some(registered) = self.registry.get_by_name(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolResult::failure(&call.name, &ToolError::NotFound(call.name.clone()));
        };

        let params = call.params_value();
        let missing = registered.spec.missing_params(&params);
        if !missing.is_empty() {
            let error = ToolError::InvalidParams(format!("missing required parameter(s): {}", missing.join(", ")));
            warn!(tool = %call.name, "{}", error);
            return ToolResult::failure(&call.name, &error);
        }

        info!(tool = %call.name, "Executing tool");
        debug!(tool = %call.name, params = %params, "Tool parameters");

        match registered.tool.execute(params).await {
            Ok(output) => {
                memo.record(call);
                debug!(tool = %call.name, chars = output.content.len(), "Tool succeeded");
                ToolResult::success(&call.name, output.content, output.artifacts)
            }
            Err(e) => {
                warn!(tool = %call.name, "Tool failed: {}", e);
                ToolResult::failure(&call.name, &e)
            }
        }
    }

    /// Run calls sequentially, in order
    pub async fn dispatch_all(&self, calls: &[ToolCall], memo: &mut DedupMemo) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.dispatch(call, memo).await);
        }
        results
    }
}
