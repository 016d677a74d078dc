//! Tool-call parser
//!
//! Finds tool calls embedded in model output. Two encodings are accepted:
//!
//! ```text
//! [TOOL:web_search]{"query": "weather in Paris"}
//! {"tool": "web_search", "parameters": {"query": "weather in Paris"}}
//! ```
//!
//! JSON bodies are delimited by balanced-brace scanning that respects string
//! literals, so braces inside parameter values do not end the match early.
//! Malformed fragments are logged and skipped.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Default cap on calls honoured from one response
pub const DEFAULT_MAX_CALLS: usize = 5;

const TAG_OPEN: &str = "[TOOL:";

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub parameters: Map<String, Value>,
    /// Exact text matched in the model output
    pub raw_text: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
            raw_text: String::new(),
        }
    }

    /// Parameters as a JSON object value
    pub fn params_value(&self) -> Value {
        Value::Object(self.parameters.clone())
    }
}

/// Extracts tool calls from model output
#[derive(Debug, Clone, Copy)]
pub struct ToolCallParser {
    max_calls: usize,
}

impl Default for ToolCallParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALLS)
    }
}

impl ToolCallParser {
    pub fn new(max_calls: usize) -> Self {
        Self {
            max_calls: max_calls.max(1),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Tool calls in first-seen order, at most `max_calls`
    pub fn parse(&self, text: &str) -> Vec<ToolCall> {
        scan(text, self.max_calls)
            .into_iter()
            .map(|(_, call)| call)
            .collect()
    }

    pub fn contains_tool_call(&self, text: &str) -> bool {
        !scan(text, 1).is_empty()
    }
}

/// Remove every tool call, and any dangling `[TOOL:...]` tag, from `text`
pub fn strip_tool_syntax(text: &str) -> String {
    let spans: Vec<Range<usize>> = scan(text, usize::MAX)
        .into_iter()
        .map(|(span, _)| span)
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        out.push_str(&text[last..span.start]);
        last = span.end;
    }
    out.push_str(&text[last..]);

    while let Some(start) = out.find(TAG_OPEN) {
        let end = out[start..]
            .find(']')
            .map(|i| start + i + 1)
            .unwrap_or(out.len());
        out.replace_range(start..end, "");
    }
    out
}

/// Scan left to right for tool calls, returning each with its byte span
fn scan(text: &str, limit: usize) -> Vec<(Range<usize>, ToolCall)> {
    let mut calls = Vec::new();
    let mut pos = 0;

    while pos < text.len() && calls.len() < limit {
        let rest = &text[pos..];
        let tag = rest.find(TAG_OPEN);
        let brace = rest.find('{');

        let (start, is_tag) = match (tag, brace) {
            (Some(t), Some(b)) if t < b => (pos + t, true),
            (Some(t), None) => (pos + t, true),
            (_, Some(b)) => (pos + b, false),
            (None, None) => break,
        };

        if is_tag {
            match parse_tag(text, start) {
                TagScan::Call(span, call) => {
                    pos = span.end;
                    calls.push((span, call));
                }
                TagScan::Skip(next) => pos = next,
            }
            continue;
        }

        let Some(end) = matching_brace(text, start) else {
            pos = start + 1;
            continue;
        };
        let body = &text[start..=end];

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(mut obj)) => match obj.get("tool").and_then(Value::as_str) {
                Some(name) if !name.trim().is_empty() => {
                    let name = name.trim().to_string();
                    let parameters = match obj.remove("parameters") {
                        Some(Value::Object(params)) => params,
                        Some(Value::Null) | None => Map::new(),
                        Some(other) => {
                            debug!(tool = %name, "Ignoring non-object parameters: {}", other);
                            Map::new()
                        }
                    };
                    calls.push((
                        start..end + 1,
                        ToolCall {
                            name,
                            parameters,
                            raw_text: body.to_string(),
                        },
                    ));
                    pos = end + 1;
                }
                // Plain JSON in the answer; a call may still be nested inside
                _ => pos = start + 1,
            },
            Ok(_) => pos = start + 1,
            Err(e) => {
                if body.contains("\"tool\"") {
                    debug!("Skipping malformed tool JSON: {}", e);
                }
                pos = start + 1;
            }
        }
    }

    calls
}

enum TagScan {
    Call(Range<usize>, ToolCall),
    Skip(usize),
}

/// Parse a `[TOOL:name]{...}` occurrence starting at `start`
fn parse_tag(text: &str, start: usize) -> TagScan {
    let name_start = start + TAG_OPEN.len();
    let Some(close) = text[name_start..].find(']').map(|i| name_start + i) else {
        return TagScan::Skip(name_start);
    };

    let name = text[name_start..close].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        debug!("Skipping tool tag with invalid name {:?}", name);
        return TagScan::Skip(name_start);
    }

    let after = close + 1;
    let body_start = after + (text[after..].len() - text[after..].trim_start().len());

    if !text[body_start..].starts_with('{') {
        // A bare tag is a call without parameters
        return TagScan::Call(
            start..after,
            ToolCall {
                name: name.to_string(),
                parameters: Map::new(),
                raw_text: text[start..after].to_string(),
            },
        );
    }

    let Some(end) = matching_brace(text, body_start) else {
        debug!(tool = %name, "Skipping tool tag with unterminated JSON");
        return TagScan::Skip(after);
    };

    match serde_json::from_str::<Map<String, Value>>(&text[body_start..=end]) {
        Ok(parameters) => TagScan::Call(
            start..end + 1,
            ToolCall {
                name: name.to_string(),
                parameters,
                raw_text: text[start..=end].to_string(),
            },
        ),
        Err(e) => {
            debug!(tool = %name, "Skipping malformed tool JSON: {}", e);
            TagScan::Skip(end + 1)
        }
    }
}

/// Index of the `}` closing the `{` at `open`, ignoring braces in strings
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
