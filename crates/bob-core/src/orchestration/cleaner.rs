//! Final response cleanup
//!
//! Removes framing the model tends to echo: role labels, chat-template
//! delimiters and leftover tool-call syntax. When an envelope is configured,
//! text before the salutation and after the signature is dropped.
//! [`ResponseCleaner::clean`] is total and idempotent.

use crate::config::AgentConfig;

use super::parser::strip_tool_syntax;

/// Chat-template tokens some models leak into raw completions
const DELIMITERS: &[&str] = &[
    "<|im_start|>",
    "<|im_end|>",
    "<|assistant|>",
    "<|user|>",
    "<|system|>",
    "<|end|>",
    "<|eot_id|>",
    "<|endoftext|>",
    "<start_of_turn>",
    "<end_of_turn>",
    "</s>",
    "<s>",
    "[INST]",
    "[/INST]",
];

/// Labels stripped from the start of a line
const ROLE_LABELS: &[&str] = &["Assistant:", "Bob:", "AI:", "Response:", "Answer:"];

/// A line starting with one of these means the model began writing the
/// other side of the conversation; everything from there is dropped
const TURN_LABELS: &[&str] = &["User:", "Human:"];

#[derive(Debug, Clone, Default)]
pub struct ResponseCleaner {
    salutation: Option<String>,
    signature: Option<String>,
}

impl ResponseCleaner {
    pub fn new(salutation: Option<String>, signature: Option<String>) -> Self {
        Self {
            salutation: salutation.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            signature: signature.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        }
    }

    pub fn from_config(agent: &AgentConfig) -> Self {
        Self::new(agent.salutation.clone(), agent.signature.clone())
    }

    pub fn clean(&self, raw: &str) -> String {
        let mut text = strip_tool_syntax(raw);
        for delimiter in DELIMITERS {
            if text.contains(delimiter) {
                text = text.replace(delimiter, "");
            }
        }

        let text = strip_roles(&text);
        let text = self.trim_envelope(&text);
        collapse_blank_lines(text.trim())
    }

    fn trim_envelope<'a>(&self, text: &'a str) -> &'a str {
        let mut text = text;

        if let Some(salutation) = &self.salutation {
            if let Some(start) = find_word(text, salutation) {
                text = &text[start..];
            }
        }

        if let Some(signature) = &self.signature {
            if let Some(pos) = text.rfind(signature.as_str()) {
                text = &text[..pos + signature.len()];
            }
        }

        text
    }
}

/// Drop leading role labels and cut at a fake next turn
fn strip_roles(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();

    'lines: for line in text.lines() {
        let trimmed = line.trim_start();
        let opening = lines.iter().all(|l| l.trim().is_empty());

        // Labels can be stacked ("Assistant: User: ..."); peel until none is left
        let mut content = trimmed;
        loop {
            if let Some(rest) = ROLE_LABELS.iter().find_map(|label| content.strip_prefix(label)) {
                content = rest.trim_start();
                continue;
            }
            if let Some(rest) = TURN_LABELS.iter().find_map(|label| content.strip_prefix(label)) {
                if !opening {
                    break 'lines;
                }
                // The label opens the text; it was echoed, keep the content
                content = rest.trim_start();
                continue;
            }
            break;
        }
        lines.push(if content.len() == trimmed.len() { line } else { content });
    }

    lines.join("\n")
}

/// First occurrence of `word` standing as a whole word
fn find_word(text: &str, word: &str) -> Option<usize> {
    text.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back();
        let after = text[i + word.len()..].chars().next();
        before.is_none_or(|c| !c.is_alphanumeric()) && after.is_none_or(|c| !c.is_alphanumeric())
    })
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("\n\n\n") {
        out = out.replace("\n\n\n", "\n\n");
    }
    out
}
