//! Splits an email body into the latest message and its quoted history
//!
//! Quoted blocks are introduced by an `On ... wrote:` line and nest through
//! `>` prefixes. Nesting is tracked on an explicit stack capped at
//! [`MAX_QUOTE_DEPTH`]; deeper headers are kept as plain quoted text.

use serde::{Deserialize, Serialize};

use crate::context::budget::truncate_to_chars;

/// Deepest quoted block tracked as its own message
pub const MAX_QUOTE_DEPTH: usize = 16;

/// One earlier message recovered from the quoted history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub sender: String,
    pub body: String,
}

/// The latest message plus its history, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadBody {
    pub body: String,
    pub history: Vec<QuotedMessage>,
}

impl ThreadBody {
    /// Render the history as compact prompt text, keeping the newest messages
    /// when it exceeds `max_chars`. A newest message that is too long on its
    /// own is cut at a word boundary rather than dropped.
    pub fn condensed_history(&self, max_chars: usize) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut used = 0;

        for message in self.history.iter().rev() {
            let part = format!("{} wrote: {}", message.sender, message.body.replace('\n', " "));
            let len = part.chars().count();
            if used + len > max_chars {
                if parts.is_empty() {
                    parts.push(truncate_to_chars(&part, max_chars));
                }
                break;
            }
            used += len;
            parts.push(part);
        }

        parts.reverse();
        parts.join("\n")
    }
}

struct Frame {
    sender: String,
    /// Quote level of this block's content
    level: usize,
    /// Order in which the header was seen; lower is newer
    seq: usize,
    lines: Vec<String>,
}

/// Parse an email body into the latest message and its quoted history
pub fn parse_thread(body: &str) -> ThreadBody {
    if body.trim().is_empty() {
        return ThreadBody::default();
    }

    let mut latest: Vec<&str> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut finished: Vec<Frame> = Vec::new();
    let mut next_seq = 0;

    for line in body.lines() {
        let (level, text) = strip_quote_prefix(line);

        if let Some(sender) = wrote_header(text) {
            if stack.len() < MAX_QUOTE_DEPTH {
                close_deeper(&mut stack, &mut finished, level);
                stack.push(Frame {
                    sender,
                    level: level + 1,
                    seq: next_seq,
                    lines: Vec::new(),
                });
                next_seq += 1;
                continue;
            }
        }

        if stack.is_empty() {
            latest.push(line);
            continue;
        }

        // Unprefixed text after the first header still belongs to the
        // outermost quoted block.
        close_deeper(&mut stack, &mut finished, level.max(1));
        if let Some(top) = stack.last_mut() {
            if !text.is_empty() || !top.lines.is_empty() {
                top.lines.push(text.to_string());
            }
        }
    }

    finished.append(&mut stack);
    finished.sort_by(|a, b| b.seq.cmp(&a.seq));

    let history = finished
        .into_iter()
        .filter_map(|frame| {
            let body = frame.lines.join("\n").trim().to_string();
            (!body.is_empty()).then_some(QuotedMessage {
                sender: frame.sender,
                body,
            })
        })
        .collect();

    ThreadBody {
        body: latest.join("\n").trim().to_string(),
        history,
    }
}

/// Pop frames whose content is quoted deeper than `level`. The outermost
/// frame is never popped.
fn close_deeper(stack: &mut Vec<Frame>, finished: &mut Vec<Frame>, level: usize) {
    while stack.len() > 1 && stack.last().is_some_and(|f| f.level > level) {
        if let Some(frame) = stack.pop() {
            finished.push(frame);
        }
    }
}

/// Count leading `>` markers and return the remaining text
fn strip_quote_prefix(line: &str) -> (usize, &str) {
    let mut level = 0;
    let mut rest = line.trim();
    while let Some(stripped) = rest.strip_prefix('>') {
        level += 1;
        rest = stripped.trim_start();
    }
    (level, rest.trim_end())
}

/// Sender named by an `On ... wrote:` line
fn wrote_header(text: &str) -> Option<String> {
    let inner = text.strip_prefix("On ")?.strip_suffix("wrote:")?.trim();
    if inner.is_empty() {
        return None;
    }

    if let (Some(start), Some(end)) = (inner.rfind('<'), inner.rfind('>')) {
        if start < end {
            return Some(inner[start + 1..end].trim().to_string());
        }
    }

    let sender = inner.rsplit(',').next().unwrap_or(inner).trim();
    Some(if sender.is_empty() { "Unknown" } else { sender }.to_string())
}
