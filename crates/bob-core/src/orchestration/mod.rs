//! Tool-augmented prompt orchestration
//!
//! This module contains the core request loop:
//! - Tool-call parsing from model output
//! - Tool dispatch with per-run deduplication
//! - The orchestration state machine
//! - Final response cleanup

mod agent_loop;
mod cleaner;
mod dispatcher;
mod parser;
mod state;

pub use agent_loop::{OrchestrationLoop, RunOptions, RunOutcome};
pub use cleaner::ResponseCleaner;
pub use dispatcher::{CallFingerprint, DedupMemo, ToolDispatcher, ToolResult, ToolStatus, ERROR_MARKER};
pub use parser::{strip_tool_syntax, ToolCall, ToolCallParser, DEFAULT_MAX_CALLS};
pub use state::{ConversationState, IterationRecord, LoopState};
