//! Prompt builder
//!
//! Assembles the prompt shapes used by the orchestration loop. Every shape
//! is split into a fixed head (instructions and the request) and a variable
//! tail (tool results, summaries). Only the tail is truncated when the
//! prompt would not fit the context budget.

use crate::config::Config;
use crate::context::ContextBudget;
use crate::tools::{ToolRegistry, ToolSpec};

use super::templates::{self, render};

/// Sentinel used for the running summary before the first iteration
pub const NO_SUMMARY: &str = "None";

/// Builds the initial, intermediate, final and summary prompts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget: ContextBudget,
    tool_list: Option<String>,
    max_calls_per_turn: usize,
    salutation: Option<String>,
    signature: Option<String>,
    summary_max_tokens: usize,
}

impl PromptBuilder {
    pub fn new(budget: ContextBudget) -> Self {
        Self {
            budget,
            tool_list: None,
            max_calls_per_turn: 5,
            salutation: None,
            signature: None,
            summary_max_tokens: 256,
        }
    }

    pub fn from_config(config: &Config, registry: &ToolRegistry) -> Self {
        Self::new(ContextBudget::from_config(&config.model, &config.agent))
            .with_tools(&registry.specs(), config.agent.max_calls_per_turn)
            .with_envelope(config.agent.salutation.clone(), config.agent.signature.clone())
            .with_summary_max_tokens(config.agent.summary_max_tokens)
    }

    /// Describe these tools in tool-enabled prompts
    pub fn with_tools(mut self, specs: &[&ToolSpec], max_calls_per_turn: usize) -> Self {
        self.tool_list = (!specs.is_empty()).then(|| tool_list(specs));
        self.max_calls_per_turn = max_calls_per_turn.max(1);
        self
    }

    pub fn with_envelope(mut self, salutation: Option<String>, signature: Option<String>) -> Self {
        self.salutation = salutation.filter(|s| !s.trim().is_empty());
        self.signature = signature.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_summary_max_tokens(mut self, tokens: usize) -> Self {
        self.summary_max_tokens = tokens.max(1);
        self
    }

    /// Reserve room for text the backend wraps around each prompt
    pub fn with_framing_chars(mut self, chars: usize) -> Self {
        self.budget = self.budget.with_framing_chars(chars);
        self
    }

    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    pub fn summary_max_tokens(&self) -> usize {
        self.summary_max_tokens
    }

    /// First prompt of a tool-enabled run
    pub fn build_initial(&self, user_prompt: &str) -> String {
        let text = render(
            templates::INITIAL,
            &[
                ("PERSONA", templates::PERSONA),
                ("TOOLS", &self.tool_section()),
                ("ENVELOPE", &self.envelope()),
                ("USER_PROMPT", user_prompt),
            ],
        );
        self.budget.fit("", &tidy(text))
    }

    /// Prompt for a run without tools
    pub fn build_plain(&self, user_prompt: &str) -> String {
        let text = render(
            templates::PLAIN,
            &[
                ("PERSONA", templates::PERSONA),
                ("ENVELOPE", &self.envelope()),
                ("USER_PROMPT", user_prompt),
            ],
        );
        self.budget.fit("", &tidy(text))
    }

    /// Prompt after a round of tool calls
    pub fn build_intermediate(
        &self,
        user_prompt: &str,
        tool_results: &[String],
        iteration: usize,
        history_summary: &str,
    ) -> String {
        let iteration = iteration.to_string();
        let head = render(
            templates::INTERMEDIATE_HEAD,
            &[
                ("PERSONA", templates::PERSONA),
                ("TOOLS", &self.tool_section()),
                ("ENVELOPE", &self.envelope()),
                ("USER_PROMPT", user_prompt),
                ("ITERATION", &iteration),
            ],
        );
        self.budget.fit(&tidy(head), &results_and_summary(tool_results, history_summary))
    }

    /// Last prompt of a run; asks for a tool-free answer
    pub fn build_final(&self, user_prompt: &str, tool_results: &[String], history_summary: &str) -> String {
        let head = render(
            templates::FINAL_HEAD,
            &[
                ("PERSONA", templates::PERSONA),
                ("ENVELOPE", &self.envelope()),
                ("USER_PROMPT", user_prompt),
            ],
        );
        self.budget.fit(&tidy(head), &results_and_summary(tool_results, history_summary))
    }

    /// Prompt asking the model to condense the run so far
    pub fn build_summary(
        &self,
        user_prompt: &str,
        response: &str,
        tool_results: &[String],
        previous_summary: &str,
    ) -> String {
        // Rough words-per-token ratio for English text
        let max_words = (self.summary_max_tokens * 3 / 4).max(10).to_string();
        let head = render(
            templates::SUMMARY_HEAD,
            &[("MAX_WORDS", &max_words), ("USER_PROMPT", user_prompt)],
        );

        let mut tail = render(templates::RESPONSE_SECTION, &[("RESPONSE", response)]);
        tail.push_str(&render(
            templates::RESULTS_SECTION,
            &[("TOOL_RESULTS", &join_results(tool_results))],
        ));
        tail.push_str(&render(
            templates::PREVIOUS_SUMMARY_SECTION,
            &[("SUMMARY", previous_summary)],
        ));

        self.budget.fit(&head, &tail)
    }

    fn tool_section(&self) -> String {
        match &self.tool_list {
            Some(list) => render(
                templates::TOOL_INSTRUCTIONS,
                &[
                    ("MAX_CALLS", &self.max_calls_per_turn.to_string()),
                    ("TOOL_LIST", list),
                ],
            ),
            None => String::new(),
        }
    }

    fn envelope(&self) -> String {
        match (&self.salutation, &self.signature) {
            (Some(salutation), Some(signature)) => render(
                templates::ENVELOPE_RULES,
                &[("SALUTATION", salutation), ("SIGNATURE", signature)],
            ),
            (Some(salutation), None) => format!("Begin your reply with \"{} <name>,\".", salutation),
            (None, Some(signature)) => format!("End your reply with \"Sincerely, {}\".", signature),
            (None, None) => String::new(),
        }
    }
}

/// One line per tool: name, description, parameters and an example call
fn tool_list(specs: &[&ToolSpec]) -> String {
    specs
        .iter()
        .map(|spec| {
            let params = if spec.parameters.is_empty() {
                "none".to_string()
            } else {
                spec.parameters
                    .iter()
                    .map(|p| {
                        format!(
                            "{} ({}{}): {}",
                            p.name,
                            p.kind,
                            if p.required { ", required" } else { "" },
                            p.description
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            format!(
                "- {}: {}. Parameters: {}. Example: {}",
                spec.name,
                spec.description,
                params,
                spec.call_example()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_results(tool_results: &[String]) -> String {
    if tool_results.is_empty() {
        "(none)".to_string()
    } else {
        tool_results.join("\n\n")
    }
}

fn results_and_summary(tool_results: &[String], history_summary: &str) -> String {
    let mut tail = render(
        templates::RESULTS_SECTION,
        &[("TOOL_RESULTS", &join_results(tool_results))],
    );
    tail.push_str(&render(templates::SUMMARY_SECTION, &[("SUMMARY", history_summary)]));
    tail
}

/// Collapse blank sections left by empty placeholders
fn tidy(text: String) -> String {
    let mut out = text;
    while out.contains("\n\n\n") {
        out = out.replace("\n\n\n", "\n\n");
    }
    out.trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TRUNCATION_MARKER;
    use crate::tools::ToolKind;

    fn builder() -> PromptBuilder {
        let specs: Vec<ToolSpec> = [ToolKind::WebSearch, ToolKind::GetSystemInfo]
            .iter()
            .map(|k| k.spec())
            .collect();
        let refs: Vec<&ToolSpec> = specs.iter().collect();
        PromptBuilder::new(ContextBudget::new(4096, 512, 4))
            .with_tools(&refs, 5)
            .with_envelope(Some("Dear".into()), Some("Bob the Raspberry Pi".into()))
    }

    #[test]
    fn test_initial_prompt_lists_tools() {
        let prompt = builder().build_initial("What's the weather in Paris?");
        assert!(prompt.contains("[TOOL:web_search]{\"query\":\"<query>\"}"));
        assert!(prompt.contains("get_system_info"));
        assert!(prompt.contains("at most 5 tools"));
        assert!(prompt.contains("Sincerely, Bob the Raspberry Pi"));
        assert!(prompt.ends_with("What's the weather in Paris?"));
    }

    #[test]
    fn test_plain_prompt_has_no_tools() {
        let prompt = builder().build_plain("Hello");
        assert!(!prompt.contains("[TOOL:"));
        assert!(prompt.ends_with("Hello"));
    }

    #[test]
    fn test_intermediate_prompt() {
        let results = vec!["[web_search] Sunny, 21C".to_string()];
        let prompt = builder().build_intermediate("Weather?", &results, 2, NO_SUMMARY);
        assert!(prompt.contains("step 2"));
        assert!(prompt.contains("Sunny, 21C"));
        assert!(prompt.contains("Summary of earlier steps:\nNone"));
        assert!(prompt.contains("[TOOL:web_search]"));
    }

    #[test]
    fn test_final_prompt_forbids_tools() {
        let prompt = builder().build_final("Draw a cat", &["[generate_image] saved".to_string()], "cat drawn");
        assert!(prompt.contains("Do not call any tools"));
        assert!(prompt.contains("[image: <filename>]"));
        assert!(!prompt.contains("Available tools"));
        assert!(prompt.contains("cat drawn"));
    }

    #[test]
    fn test_summary_prompt() {
        let prompt = builder().build_summary("Q", "[TOOL:web_search]{}", &[], NO_SUMMARY);
        assert!(prompt.contains("at most 192 words"));
        assert!(prompt.contains("Tool results:\n(none)"));
        assert!(prompt.ends_with("Previous summary:\nNone"));
    }

    #[test]
    fn test_oversized_results_truncated() {
        let builder = PromptBuilder::new(ContextBudget::new(600, 100, 4));
        let results = vec!["The sky is blue today. ".repeat(400)];
        let prompt = builder.build_final("Weather?", &results, "older summary");

        assert!(builder.budget().fits(&prompt));
        assert!(prompt.ends_with(TRUNCATION_MARKER));
        assert!(prompt.contains("Request:\nWeather?"));
    }

    #[test]
    fn test_without_envelope() {
        let prompt = PromptBuilder::new(ContextBudget::default()).build_plain("Hi");
        assert!(!prompt.contains("Sincerely"));
        assert!(!prompt.contains("\n\n\n"));
    }
}
