//! Per-run conversation state
//!
//! A fresh [`ConversationState`] is created for every run and discarded
//! when the run ends. Nothing here is shared between runs.

use std::fmt;
use std::path::PathBuf;

use crate::prompt::NO_SUMMARY;

use super::dispatcher::{DedupMemo, ToolResult};
use super::parser::ToolCall;

/// Steps of the orchestration state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    AwaitModel,
    CheckTools,
    DispatchTools,
    Summarize,
    Finalize,
    Done,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Init => "init",
            LoopState::AwaitModel => "await_model",
            LoopState::CheckTools => "check_tools",
            LoopState::DispatchTools => "dispatch_tools",
            LoopState::Summarize => "summarize",
            LoopState::Finalize => "finalize",
            LoopState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Calls made in one iteration and what they returned
#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub iteration: usize,
    pub calls: Vec<ToolCall>,
    pub results: Vec<ToolResult>,
}

impl IterationRecord {
    /// True when at least one call produced something not seen before
    pub fn has_new_information(&self) -> bool {
        self.results.iter().any(|r| !r.is_duplicate())
    }
}

/// Mutable state of a single orchestration run
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub original_prompt: String,
    pub current_response: String,
    pub history_summary: String,
    pub iteration_count: usize,
    pub dedup_memo: DedupMemo,
    pub iterations: Vec<IterationRecord>,
    /// Prompt text of the most recent non-duplicate results
    pub latest_results: Vec<String>,
    pub pending_calls: Vec<ToolCall>,
    pub artifacts: Vec<PathBuf>,
    pub model_calls: usize,
    pub degraded: bool,
}

impl ConversationState {
    pub fn new(original_prompt: impl Into<String>) -> Self {
        Self {
            original_prompt: original_prompt.into(),
            current_response: String::new(),
            history_summary: NO_SUMMARY.to_string(),
            iteration_count: 0,
            dedup_memo: DedupMemo::new(),
            iterations: Vec::new(),
            latest_results: Vec::new(),
            pending_calls: Vec::new(),
            artifacts: Vec::new(),
            model_calls: 0,
            degraded: false,
        }
    }

    /// Store an iteration, keeping its results for the next prompt and
    /// collecting any files the tools produced
    pub fn record_iteration(&mut self, calls: Vec<ToolCall>, results: Vec<ToolResult>) -> &IterationRecord {
        for result in results.iter().filter(|r| r.is_success()) {
            for path in &result.artifacts {
                if !self.artifacts.contains(path) {
                    self.artifacts.push(path.clone());
                }
            }
        }

        let record = IterationRecord {
            iteration: self.iteration_count,
            calls,
            results,
        };
        if record.has_new_information() {
            self.latest_results = record
                .results
                .iter()
                .filter(|r| !r.is_duplicate())
                .map(ToolResult::to_prompt_text)
                .collect();
        }

        self.iterations.push(record);
        &self.iterations[self.iterations.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state() {
        let state = ConversationState::new("Hi");
        assert_eq!(state.history_summary, NO_SUMMARY);
        assert_eq!(state.iteration_count, 0);
        assert!(state.dedup_memo.is_empty());
        assert!(state.artifacts.is_empty());
    }

    #[test]
    fn test_loop_state_display() {
        assert_eq!(LoopState::DispatchTools.to_string(), "dispatch_tools");
    }
}
