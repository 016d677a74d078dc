//! Orchestration loop
//!
//! Drives one request from prompt to cleaned answer:
//!
//! ```text
//! Init -> AwaitModel -> CheckTools -> (DispatchTools -> Summarize -> AwaitModel)* -> Finalize -> Done
//! ```
//!
//! A response without tool calls on the first turn is the answer. Once any
//! tools have run, one extra tool-free call produces the answer from the
//! gathered results. The iteration cap bounds the number of tool rounds;
//! reaching it skips straight to the final call.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::ContextSummarizer;
use crate::error::Result;
use crate::prompt::PromptBuilder;
use crate::provider::{GenerationRequest, TextGenerator};
use crate::tools::ToolRegistry;

use super::cleaner::ResponseCleaner;
use super::dispatcher::ToolDispatcher;
use super::parser::ToolCallParser;
use super::state::{ConversationState, LoopState};

/// Per-run overrides of the configured generation settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Overrides `agent.tools_enabled`
    pub tools_enabled: Option<bool>,
}

impl RunOptions {
    pub fn without_tools() -> Self {
        Self {
            tools_enabled: Some(false),
            ..Self::default()
        }
    }
}

/// Result of one orchestration run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Cleaned answer
    pub response: String,
    /// Files produced by tools during this run
    pub artifacts: Vec<PathBuf>,
    /// Rounds of tool calls executed
    pub iterations: usize,
    /// Model invocations, summaries included
    pub model_calls: usize,
    /// True when the answer is the apology text
    pub degraded: bool,
}

#[derive(Debug, Clone)]
struct LoopSettings {
    tools_enabled: bool,
    max_iterations: usize,
    max_tokens: u32,
    temperature: f32,
    stop: Vec<String>,
    apology: String,
}

/// Tool-augmented prompt orchestration
pub struct OrchestrationLoop {
    generator: Arc<dyn TextGenerator>,
    dispatcher: ToolDispatcher,
    prompts: PromptBuilder,
    summarizer: ContextSummarizer,
    parser: ToolCallParser,
    cleaner: ResponseCleaner,
    settings: LoopSettings,
}

impl OrchestrationLoop {
    pub fn new(config: &Config, generator: Arc<dyn TextGenerator>, registry: Arc<ToolRegistry>) -> Self {
        let prompts = PromptBuilder::from_config(config, &registry)
            .with_framing_chars(generator.prompt_framing_chars());
        let summarizer =
            ContextSummarizer::new(generator.clone(), prompts.clone()).with_stop(config.model.stop.clone());

        Self {
            generator,
            dispatcher: ToolDispatcher::new(registry),
            prompts,
            summarizer,
            parser: ToolCallParser::new(config.agent.max_calls_per_turn),
            cleaner: ResponseCleaner::from_config(&config.agent),
            settings: LoopSettings {
                tools_enabled: config.agent.tools_enabled,
                max_iterations: config.agent.max_iterations,
                max_tokens: config.model.max_tokens,
                temperature: config.model.temperature,
                stop: config.model.stop.clone(),
                apology: config.agent.apology.clone(),
            },
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn cleaner(&self) -> &ResponseCleaner {
        &self.cleaner
    }

    /// Answer a request with the configured settings
    pub async fn run(&self, user_prompt: &str) -> RunOutcome {
        self.run_with(user_prompt, RunOptions::default()).await
    }

    /// Answer a request. Never fails: model errors become the apology text.
    pub async fn run_with(&self, user_prompt: &str, options: RunOptions) -> RunOutcome {
        let tools_enabled = options.tools_enabled.unwrap_or(self.settings.tools_enabled);
        let mut state = ConversationState::new(user_prompt);
        let mut prompt = String::new();
        let mut step = LoopState::Init;

        info!(tools_enabled, "Starting orchestration run");

        while step != LoopState::Done {
            debug!(state = %step, iteration = state.iteration_count, "Orchestration step");

            step = match step {
                LoopState::Init => {
                    prompt = if tools_enabled {
                        self.prompts.build_initial(&state.original_prompt)
                    } else {
                        self.prompts.build_plain(&state.original_prompt)
                    };
                    LoopState::AwaitModel
                }

                LoopState::AwaitModel => match self.call_model(&prompt, &options, &mut state).await {
                    Some(text) => {
                        state.current_response = text;
                        if tools_enabled {
                            LoopState::CheckTools
                        } else {
                            LoopState::Done
                        }
                    }
                    None => LoopState::Done,
                },

                LoopState::CheckTools => {
                    let calls = self.parser.parse(&state.current_response);
                    if calls.is_empty() {
                        if state.iteration_count == 0 {
                            LoopState::Done
                        } else {
                            LoopState::Finalize
                        }
                    } else if state.iteration_count >= self.settings.max_iterations {
                        info!(
                            iterations = state.iteration_count,
                            pending = calls.len(),
                            "Iteration cap reached, finalizing"
                        );
                        LoopState::Finalize
                    } else {
                        state.pending_calls = calls;
                        LoopState::DispatchTools
                    }
                }

                LoopState::DispatchTools => {
                    state.iteration_count += 1;
                    let calls = std::mem::take(&mut state.pending_calls);
                    info!(iteration = state.iteration_count, calls = calls.len(), "Dispatching tool calls");

                    let results = self.dispatcher.dispatch_all(&calls, &mut state.dedup_memo).await;
                    let record = state.record_iteration(calls, results);

                    if record.has_new_information() {
                        LoopState::Summarize
                    } else {
                        info!("Only repeated tool calls, finalizing");
                        LoopState::Finalize
                    }
                }

                LoopState::Summarize => {
                    let update = self
                        .summarizer
                        .summarize(
                            &state.original_prompt,
                            &state.current_response,
                            &state.latest_results,
                            &state.history_summary,
                        )
                        .await;
                    state.model_calls += 1;
                    state.history_summary = update.summary;

                    prompt = self.prompts.build_intermediate(
                        &state.original_prompt,
                        &state.latest_results,
                        state.iteration_count + 1,
                        &state.history_summary,
                    );
                    LoopState::AwaitModel
                }

                LoopState::Finalize => {
                    let final_prompt = self.prompts.build_final(
                        &state.original_prompt,
                        &state.latest_results,
                        &state.history_summary,
                    );
                    if let Some(text) = self.call_model(&final_prompt, &options, &mut state).await {
                        state.current_response = text;
                    }
                    LoopState::Done
                }

                LoopState::Done => LoopState::Done,
            };
        }

        self.finish(state)
    }

    /// One tool-free generation of a raw prompt
    pub async fn generate_once(&self, prompt: &str, options: RunOptions) -> Result<String> {
        let request = self.request(prompt, &options);
        self.generator.generate(&request).await
    }

    fn request(&self, prompt: &str, options: &RunOptions) -> GenerationRequest {
        GenerationRequest::new(
            prompt,
            options.max_tokens.unwrap_or(self.settings.max_tokens),
            options.temperature.unwrap_or(self.settings.temperature),
        )
        .with_stop(self.settings.stop.clone())
    }

    /// Invoke the model; on failure mark the run degraded and return None
    async fn call_model(
        &self,
        prompt: &str,
        options: &RunOptions,
        state: &mut ConversationState,
    ) -> Option<String> {
        state.model_calls += 1;
        match self.generator.generate(&self.request(prompt, options)).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(backend = self.generator.name(), "Model invocation failed: {}", e);
                state.degraded = true;
                None
            }
        }
    }

    fn finish(&self, state: ConversationState) -> RunOutcome {
        let mut degraded = state.degraded;
        let mut response = if degraded {
            String::new()
        } else {
            self.cleaner.clean(&state.current_response)
        };

        if response.is_empty() {
            if !degraded {
                warn!("Model produced no usable text");
            }
            degraded = true;
            response = self.settings.apology.clone();
        }

        info!(
            iterations = state.iteration_count,
            model_calls = state.model_calls,
            artifacts = state.artifacts.len(),
            degraded,
            "Orchestration run finished"
        );

        RunOutcome {
            response,
            artifacts: state.artifacts,
            iterations: state.iteration_count,
            model_calls: state.model_calls,
            degraded,
        }
    }
}
