//! Orchestration loop integration tests
//!
//! The model is a scripted generator that answers according to the kind of
//! prompt it receives; tools are counting fakes. No network is involved.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use bob_core::config::Config;
use bob_core::error::{Error, Result, ToolError};
use bob_core::orchestration::{OrchestrationLoop, RunOptions};
use bob_core::provider::{GenerationRequest, TextGenerator};
use bob_core::tools::{BoxFuture, FnTool, ToolKind, ToolOutput, ToolRegistry};

/// Which template a prompt was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Summary,
    Final,
    Turn,
}

fn classify(prompt: &str) -> PromptKind {
    if prompt.starts_with("Condense") {
        PromptKind::Summary
    } else if prompt.contains("Do not call any tools") {
        PromptKind::Final
    } else {
        PromptKind::Turn
    }
}

type Script = Box<dyn Fn(PromptKind, usize) -> std::result::Result<String, String> + Send + Sync>;

/// Generator driven by a closure of (prompt kind, turn number)
struct ScriptedModel {
    script: Script,
    turns: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(
        script: impl Fn(PromptKind, usize) -> std::result::Result<String, String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            turns: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts_of(&self, kind: PromptKind) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| classify(p) == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let kind = classify(&request.prompt);
        let turn = if kind == PromptKind::Turn {
            self.turns.fetch_add(1, Ordering::SeqCst)
        } else {
            self.turns.load(Ordering::SeqCst)
        };
        (self.script)(kind, turn).map_err(Error::Provider)
    }
}

/// Web search fake counting its invocations
fn counting_search(counter: Arc<AtomicUsize>) -> Arc<dyn bob_core::tools::Tool> {
    FnTool::shared(move |params: Value| -> BoxFuture<'static, std::result::Result<ToolOutput, ToolError>> {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let query = params["query"].as_str().unwrap_or_default().to_string();
            Ok(ToolOutput::text(format!("Top result for {}: it is sunny", query)))
        })
    })
}

fn image_tool(path: PathBuf) -> Arc<dyn bob_core::tools::Tool> {
    FnTool::shared(move |_params: Value| -> BoxFuture<'static, std::result::Result<ToolOutput, ToolError>> {
        let path = path.clone();
        Box::pin(async move {
            Ok(ToolOutput::text("Image generated and saved as cat.png. Refer to it as [image: cat.png].")
                .with_artifact(path))
        })
    })
}

fn config(max_iterations: usize) -> Config {
    let mut config = Config::default();
    config.agent.max_iterations = max_iterations;
    config
}

fn registry(counter: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(ToolKind::WebSearch, counting_search(counter));
    Arc::new(registry)
}

const ANSWER: &str = "Dear Nate,\nIt is sunny in Paris.\nSincerely, Bob the Raspberry Pi";

#[tokio::test]
async fn test_direct_answer_skips_tool_phase() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|_, _| Ok("Dear Nate, 2+2 is 4. Sincerely, Bob the Raspberry Pi".into()));
    let orchestration = OrchestrationLoop::new(&config(5), model.clone(), registry(counter.clone()));

    let outcome = orchestration.run("What's 2+2?").await;

    assert_eq!(outcome.model_calls, 1);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.response, "Dear Nate, 2+2 is 4. Sincerely, Bob the Raspberry Pi");
}

#[tokio::test]
async fn test_tool_round_then_final_answer() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|kind, turn| match (kind, turn) {
        (PromptKind::Turn, 0) => Ok(r#"[TOOL:web_search]{"query": "weather in Paris"}"#.into()),
        (PromptKind::Turn, _) => Ok("I have what I need.".into()),
        (PromptKind::Summary, _) => Ok("Summary: Paris is sunny.".into()),
        (PromptKind::Final, _) => Ok(format!("Here is my reply. {}", ANSWER)),
    });
    let orchestration = OrchestrationLoop::new(&config(5), model.clone(), registry(counter.clone()));

    let outcome = orchestration.run("What's the weather in Paris?").await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.iterations, 1);
    // initial, summary, intermediate, final
    assert_eq!(outcome.model_calls, 4);
    assert_eq!(outcome.response, ANSWER);
    assert!(!outcome.degraded);

    let intermediate = &model.prompts_of(PromptKind::Turn)[1];
    assert!(intermediate.contains("[web_search] Top result for weather in Paris: it is sunny"));
    assert!(intermediate.contains("Paris is sunny."));

    let final_prompt = &model.prompts_of(PromptKind::Final)[0];
    assert!(final_prompt.contains("it is sunny"));
}

#[tokio::test]
async fn test_iteration_cap_bounds_the_run() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|kind, turn| match kind {
        PromptKind::Turn => Ok(format!(r#"[TOOL:web_search]{{"query": "query {}"}}"#, turn)),
        PromptKind::Summary => Ok("still searching".into()),
        PromptKind::Final => Ok(format!(r#"{} [TOOL:web_search]{{"query": "more"}}"#, ANSWER)),
    });
    let orchestration = OrchestrationLoop::new(&config(3), model.clone(), registry(counter.clone()));

    let outcome = orchestration.run("Keep searching").await;

    assert_eq!(outcome.iterations, 3);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    // 4 turns, 3 summaries, 1 final
    assert_eq!(outcome.model_calls, 8);
    assert_eq!(model.prompts_of(PromptKind::Final).len(), 1);
    assert!(!outcome.response.contains("[TOOL:"));
    assert_eq!(outcome.response, ANSWER);
}

#[tokio::test]
async fn test_repeated_call_dispatched_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|kind, _| match kind {
        PromptKind::Turn => Ok(r#"{"tool": "web_search", "parameters": {"query": "same"}}"#.into()),
        PromptKind::Summary => Ok("searched once".into()),
        PromptKind::Final => Ok(ANSWER.into()),
    });
    let orchestration = OrchestrationLoop::new(&config(5), model.clone(), registry(counter.clone()));

    let outcome = orchestration.run("Search twice").await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.response, ANSWER);
    // The duplicate round adds no new information and needs no summary
    assert_eq!(model.prompts_of(PromptKind::Summary).len(), 1);
}

#[tokio::test]
async fn test_unknown_tool_reported_to_model() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|kind, turn| match (kind, turn) {
        (PromptKind::Turn, 0) => Ok(r#"[TOOL:launch_rocket]{"target": "moon"}"#.into()),
        (PromptKind::Turn, _) => Ok("No rocket, sorry.".into()),
        (PromptKind::Summary, _) => Ok("The rocket tool does not exist.".into()),
        (PromptKind::Final, _) => Ok(ANSWER.into()),
    });
    let orchestration = OrchestrationLoop::new(&config(5), model.clone(), registry(counter));

    let outcome = orchestration.run("Launch a rocket").await;

    assert!(!outcome.degraded);
    assert_eq!(outcome.iterations, 1);
    let intermediate = &model.prompts_of(PromptKind::Turn)[1];
    assert!(intermediate.contains("[launch_rocket] ERROR: unknown_tool"));
}

#[tokio::test]
async fn test_artifacts_collected_from_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let image = dir.path().join("cat.png");

    let mut tools = ToolRegistry::new();
    tools.register(ToolKind::GenerateImage, image_tool(image.clone()));

    let model = ScriptedModel::new(|kind, turn| match (kind, turn) {
        (PromptKind::Turn, 0) => Ok(r#"[TOOL:generate_image]{"prompt": "a cat"}"#.into()),
        (PromptKind::Turn, _) => Ok("Done.".into()),
        (PromptKind::Summary, _) => Ok("Generated cat.png".into()),
        (PromptKind::Final, _) => Ok("Dear Nate, here is your cat [image: cat.png]. Sincerely, Bob the Raspberry Pi".into()),
    });
    let orchestration = OrchestrationLoop::new(&config(5), model, Arc::new(tools));

    let outcome = orchestration.run("Draw me a cat").await;

    assert_eq!(outcome.artifacts, vec![image]);
    assert!(outcome.response.contains("[image: cat.png]"));

    // A second run starts clean
    let again = orchestration.run("Hello").await;
    assert!(again.artifacts.is_empty());
}

#[tokio::test]
async fn test_final_call_failure_degrades() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|kind, _| match kind {
        PromptKind::Turn => Ok(r#"[TOOL:web_search]{"query": "x"}"#.into()),
        PromptKind::Summary => Err("summary backend down".into()),
        PromptKind::Final => Err("connection reset".into()),
    });
    let orchestration = OrchestrationLoop::new(&config(1), model, registry(counter));

    let outcome = orchestration.run("Search").await;

    assert!(outcome.degraded);
    assert_eq!(outcome.response, Config::default().agent.apology);
}

#[tokio::test]
async fn test_tools_disabled_run() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|_, _| Ok(r#"Sure. [TOOL:web_search]{"query": "x"}"#.into()));
    let orchestration = OrchestrationLoop::new(&config(5), model.clone(), registry(counter.clone()));

    let outcome = orchestration.run_with("Search", RunOptions::without_tools()).await;

    assert_eq!(outcome.model_calls, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.response, "Sure.");
}

#[tokio::test]
async fn test_each_run_has_its_own_memo() {
    let counter = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new(|kind, turn| match kind {
        // Every run opens with the same call
        PromptKind::Turn if turn % 2 == 0 => Ok(r#"[TOOL:web_search]{"query": "same"}"#.into()),
        PromptKind::Turn => Ok("ok".into()),
        PromptKind::Summary => Ok("s".into()),
        PromptKind::Final => Ok(ANSWER.into()),
    });
    let orchestration = OrchestrationLoop::new(&config(5), model, registry(counter.clone()));

    orchestration.run("first").await;
    orchestration.run("second").await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
