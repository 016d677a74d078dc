//! Web tools

mod search;

pub use search::{SearchResult, WebSearch};
