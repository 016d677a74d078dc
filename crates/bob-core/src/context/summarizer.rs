//! Running summary of an orchestration run
//!
//! After each round of tool calls the model is asked to condense the
//! request, its latest response, the tool results and the previous summary.
//! The result replaces the previous summary. A failed or empty summary
//! keeps the previous one.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::prompt::PromptBuilder;
use crate::provider::{GenerationRequest, TextGenerator};

/// Sampling temperature for summaries
const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Outcome of one summarization call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryUpdate {
    pub summary: String,
    /// True when the previous summary was reused
    pub reused_previous: bool,
}

/// Condenses run history with one extra model call per iteration
pub struct ContextSummarizer {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    stop: Vec<String>,
}

impl ContextSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: PromptBuilder) -> Self {
        Self {
            generator,
            prompts,
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Produce the next summary. Never fails.
    pub async fn summarize(
        &self,
        user_prompt: &str,
        response: &str,
        tool_results: &[String],
        previous_summary: &str,
    ) -> SummaryUpdate {
        let prompt = self
            .prompts
            .build_summary(user_prompt, response, tool_results, previous_summary);
        let max_tokens = self.prompts.summary_max_tokens();
        let request = GenerationRequest::new(prompt, max_tokens as u32, SUMMARY_TEMPERATURE)
            .with_stop(self.stop.clone());

        match self.generator.generate(&request).await {
            Ok(text) => {
                let text = strip_label(&text);
                if text.is_empty() {
                    debug!("Empty summary, keeping the previous one");
                    return reuse(previous_summary);
                }
                SummaryUpdate {
                    summary: self.prompts.budget().truncate(text, max_tokens),
                    reused_previous: false,
                }
            }
            Err(e) => {
                warn!("Summarization failed, keeping the previous summary: {}", e);
                reuse(previous_summary)
            }
        }
    }
}

fn reuse(previous_summary: &str) -> SummaryUpdate {
    SummaryUpdate {
        summary: previous_summary.to_string(),
        reused_previous: true,
    }
}

/// Drop a leading "Summary:" label the model may echo
fn strip_label(text: &str) -> &str {
    let text = text.trim();
    match text.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("summary:") => text[8..].trim(),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBudget;
    use crate::error::{Error, Result};
    use crate::prompt::NO_SUMMARY;
    use async_trait::async_trait;

    struct Fixed(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl TextGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            self.0
                .map(str::to_string)
                .map_err(|e| Error::Provider(e.to_string()))
        }
    }

    fn summarizer(reply: std::result::Result<&'static str, &'static str>) -> ContextSummarizer {
        let prompts = PromptBuilder::new(ContextBudget::new(4096, 512, 4)).with_summary_max_tokens(8);
        ContextSummarizer::new(Arc::new(Fixed(reply)), prompts)
    }

    #[tokio::test]
    async fn test_summary_replaces_previous() {
        let update = summarizer(Ok("Summary: Paris is sunny."))
            .summarize("Weather?", "[TOOL:web_search]{}", &["sunny".into()], NO_SUMMARY)
            .await;
        assert_eq!(update.summary, "Paris is sunny.");
        assert!(!update.reused_previous);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous() {
        let update = summarizer(Err("boom"))
            .summarize("Weather?", "resp", &[], "earlier facts")
            .await;
        assert_eq!(update.summary, "earlier facts");
        assert!(update.reused_previous);
    }

    #[tokio::test]
    async fn test_empty_output_keeps_previous() {
        let update = summarizer(Ok("   ")).summarize("Q", "R", &[], NO_SUMMARY).await;
        assert_eq!(update.summary, NO_SUMMARY);
        assert!(update.reused_previous);
    }

    #[tokio::test]
    async fn test_summary_is_bounded() {
        let long = "word ".repeat(200);
        let long: &'static str = Box::leak(long.into_boxed_str());
        let update = summarizer(Ok(long)).summarize("Q", "R", &[], NO_SUMMARY).await;
        assert!(ContextBudget::new(4096, 512, 4).estimate_tokens(&update.summary) <= 8);
    }
}
