//! Bob Core - a mailbox agent backed by a local language model
//!
//! This crate provides the core functionality for Bob:
//! - Tool-augmented prompt orchestration
//! - Tool catalog and tool backends (web search, Moltbook, email, system, images)
//! - Model providers (llama.cpp server, genai)
//! - Mailbox and allow-list collaborators
//! - Email responder and Moltbook browsing routines

pub mod allowlist;
pub mod browse;
pub mod config;
pub mod context;
pub mod error;
pub mod mail;
pub mod orchestration;
pub mod prompt;
pub mod provider;
pub mod responder;
pub mod tools;

pub use allowlist::{AllowList, ApprovedSender, MemoryAllowList, SqliteAllowList};
pub use browse::{BrowseOutcome, MoltbookBrowser};
pub use config::{Config, ConfigManager};
pub use error::{Error, Result, ToolError};
pub use mail::{ImapSmtpMailbox, InboundEmail, Mailbox, OutboundEmail};
pub use provider::{create_generator, GenerationRequest, TextGenerator};
pub use responder::{Disposition, EmailResponder, InboxReport};
pub use tools::{Tool, ToolKind, ToolOutput, ToolRegistry, ToolRegistryBuilder, ToolSpec};

// Orchestration exports
pub use orchestration::{
    ConversationState, OrchestrationLoop, ResponseCleaner, RunOptions, RunOutcome, ToolCall,
    ToolCallParser, ToolDispatcher, ToolResult,
};
