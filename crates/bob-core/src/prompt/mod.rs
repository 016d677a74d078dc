//! Prompt construction for the orchestration loop
//!
//! - [`templates`] holds the fixed prompt text
//! - [`builder`] fills it in and keeps the result inside the context budget

pub mod builder;
pub mod templates;

pub use builder::{PromptBuilder, NO_SUMMARY};
