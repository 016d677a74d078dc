//! Context management
//!
//! Keeps prompts inside the model's context window and condenses the
//! history of a run into a running summary.

pub mod budget;
pub mod summarizer;

pub use budget::{ContextBudget, TRUNCATION_MARKER};
pub use summarizer::{ContextSummarizer, SummaryUpdate};
