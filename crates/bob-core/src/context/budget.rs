//! Context-window budget
//!
//! Token counts are estimated with a fixed characters-per-token ratio. The
//! estimate is deliberately coarse; the ratio is configurable.

use crate::config::{AgentConfig, ModelConfig};

/// Appended wherever material was cut to fit the budget
pub const TRUNCATION_MARKER: &str = "[... earlier context truncated]";

/// Token budget of one prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Total context window of the model, in tokens
    pub context_window: usize,
    /// Tokens kept free for the model's answer
    pub reserved_response_tokens: usize,
    pub chars_per_token: usize,
    /// Characters the backend wraps around every prompt
    pub framing_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default(), &AgentConfig::default())
    }
}

impl ContextBudget {
    pub fn new(context_window: usize, reserved_response_tokens: usize, chars_per_token: usize) -> Self {
        Self {
            context_window,
            reserved_response_tokens,
            chars_per_token: chars_per_token.max(1),
            framing_chars: 0,
        }
    }

    /// Keep room for text the backend adds around the prompt
    pub fn with_framing_chars(mut self, chars: usize) -> Self {
        self.framing_chars = chars;
        self
    }

    pub fn from_config(model: &ModelConfig, agent: &AgentConfig) -> Self {
        Self::new(
            model.context_window,
            agent.reserved_response_tokens,
            agent.chars_per_token,
        )
    }

    /// Tokens a prompt may use
    pub fn available_tokens(&self) -> usize {
        self.context_window
            .saturating_sub(self.reserved_response_tokens)
            .saturating_sub(self.framing_chars.div_ceil(self.chars_per_token))
    }

    pub fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    pub fn fits(&self, text: &str) -> bool {
        self.estimate_tokens(text) <= self.available_tokens()
    }

    /// Join a fixed head and a variable tail, truncating the tail so the
    /// whole stays within the budget. The head is only cut when it alone
    /// overflows.
    pub fn fit(&self, head: &str, tail: &str) -> String {
        let whole = format!("{}{}", head, tail);
        if self.fits(&whole) {
            return whole;
        }

        let max_chars = self.available_tokens() * self.chars_per_token;
        let head_chars = head.chars().count();
        let marker_chars = TRUNCATION_MARKER.chars().count() + 1;

        if head_chars + marker_chars >= max_chars {
            return truncate_to_chars(&whole, max_chars);
        }

        let kept = truncate_to_chars(tail, max_chars - head_chars);
        format!("{}{}", head, kept)
    }

    /// Truncate text to at most `max_tokens` estimated tokens
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if self.estimate_tokens(text) <= max_tokens {
            return text.to_string();
        }
        truncate_to_chars(text, max_tokens * self.chars_per_token)
    }
}

/// Cut `text` to at most `max_chars` characters including the marker,
/// ending at a line or sentence boundary, else at a word boundary.
pub(crate) fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    let marker_chars = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_chars + 1 {
        return TRUNCATION_MARKER.chars().take(max_chars).collect();
    }

    let budget = max_chars - marker_chars - 1;
    let cut_byte = text
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let window = &text[..cut_byte];

    let boundary = window
        .rfind('\n')
        .map(|i| i + 1)
        .into_iter()
        .chain(window.rfind(". ").map(|i| i + 1))
        .max()
        .filter(|&i| i > 0)
        .or_else(|| window.rfind(char::is_whitespace))
        .unwrap_or(0);

    let kept = window[..boundary].trim_end();
    if kept.is_empty() {
        TRUNCATION_MARKER.to_string()
    } else {
        format!("{}\n{}", kept, TRUNCATION_MARKER)
    }
}
