//! Tool system for Bob
//!
//! Tools are the external actions the model may request. The set of tools is
//! closed: every tool is a [`ToolKind`] variant with a static [`ToolSpec`].
//! A concrete backend is attached to a kind at startup by registering a
//! [`Tool`] capability in the [`ToolRegistry`].

pub mod catalog;
pub mod email;
pub mod image;
pub mod moltbook;
pub mod registry;
pub mod system;
pub mod web;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ToolError;

pub use catalog::ToolKind;
pub use registry::{ToolRegistry, ToolRegistryBuilder};

/// Boxed future type for object-safe async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Output from a successful tool execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text handed back to the model
    pub content: String,
    /// Files produced by the tool (generated images)
    pub artifacts: Vec<PathBuf>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push(path.into());
        self
    }
}

/// One parameter of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: "string",
            description,
            required: true,
        }
    }
}

/// Static description of a tool, used to build prompts and validate calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    /// JSON schema for the parameters
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.to_string(),
                json!({ "type": param.kind, "description": param.description }),
            );
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Example invocation in the bracket-tag syntax the model is taught
    pub fn call_example(&self) -> String {
        let mut params = Map::new();
        for param in &self.parameters {
            params.insert(param.name.to_string(), Value::String(format!("<{}>", param.name)));
        }
        format!("[TOOL:{}]{}", self.name, Value::Object(params))
    }

    /// Names of required parameters missing from `params`
    pub fn missing_params(&self, params: &Value) -> Vec<&'static str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .filter(|p| match params.get(p.name) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|p| p.name)
            .collect()
    }
}

/// A capability that executes one tool
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>>;
}

/// Adapts a closure into a [`Tool`]
pub struct FnTool<F> {
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(Value) -> BoxFuture<'static, Result<ToolOutput, ToolError>> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }

    pub fn shared(func: F) -> Arc<dyn Tool>
    where
        F: 'static,
    {
        Arc::new(Self::new(func))
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(Value) -> BoxFuture<'static, Result<ToolOutput, ToolError>> + Send + Sync,
{
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        (self.func)(params)
    }
}

/// Fetch a required string parameter
pub(crate) fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidParams(format!("{} is required", key)))
}

/// Fetch a parameter that models sometimes send as a number
pub(crate) fn id_param(params: &Value, key: &str) -> Result<String, ToolError> {
    match params.get(key) {
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => str_param(params, key).map(str::to_string),
    }
}
