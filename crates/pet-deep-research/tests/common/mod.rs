//! Shared mocks for workflow integration tests
//!
//! - `ScriptedModel` answers planner, reflection and synthesis requests with
//!   canned replies and counts calls per step
//! - `SpySearch` returns canned hits per query and records every call

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pet_deep_research::{
    GenerateRequest, LanguageModel, ResearchConfig, ResearchError, ResearchWorkflow, Result,
    RetryPolicy, SearchHit, SearchProvider,
};

pub const CAT_QUESTION: &str = "Is it normal for my cat to sleep 16 hours a day?";

/// A well-formed English answer citing footnotes 1 to 3.
pub const ENGLISH_ANSWER: &str = "## Possible Causes\nAdult cats normally sleep 12-16 hours a day[^1]. Older cats sleep more[^2].\n\n## Home Care\nKeep a regular play routine[^3].\n\n## When to See a Vet\nSee a vet if your cat is hard to wake, stops eating, or hides.\n\n## Reminder\nSleep alone is rarely a concern.";

#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail(fn() -> ResearchError),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }

    fn produce(&self) -> Result<String> {
        match self {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(make) => Err(make()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planner,
    Reflection,
    Synthesis,
}

/// Which workflow step sent `request`, judged by its schema.
pub fn stage_of(request: &GenerateRequest) -> Stage {
    match &request.schema {
        None => Stage::Synthesis,
        Some(schema) if schema["properties"].get("needMore").is_some() => Stage::Reflection,
        Some(_) => Stage::Planner,
    }
}

pub struct ScriptedModel {
    planner: Reply,
    reflection: Reply,
    synthesis: Reply,
    planner_calls: AtomicUsize,
    reflection_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
    synthesis_prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(planner: Reply, reflection: Reply, synthesis: Reply) -> Arc<Self> {
        Arc::new(Self {
            planner,
            reflection,
            synthesis,
            planner_calls: AtomicUsize::new(0),
            reflection_calls: AtomicUsize::new(0),
            synthesis_calls: AtomicUsize::new(0),
            synthesis_prompts: Mutex::new(Vec::new()),
        })
    }

    /// Planner suggests two queries, reflection says "enough", synthesis
    /// returns [`ENGLISH_ANSWER`].
    pub fn happy_path() -> Arc<Self> {
        Self::new(
            Reply::text(r#"{"queries": ["cat sleeping 16 hours normal", "how much sleep do cats need"]}"#),
            Reply::text(r#"{"needMore": false}"#),
            Reply::text(ENGLISH_ANSWER),
        )
    }

    pub fn with_reflection(reflection: Reply) -> Arc<Self> {
        Self::new(
            Reply::text(r#"{"queries": ["cat sleeping 16 hours normal", "how much sleep do cats need"]}"#),
            reflection,
            Reply::text(ENGLISH_ANSWER),
        )
    }

    pub fn calls(&self, stage: Stage) -> usize {
        match stage {
            Stage::Planner => self.planner_calls.load(Ordering::SeqCst),
            Stage::Reflection => self.reflection_calls.load(Ordering::SeqCst),
            Stage::Synthesis => self.synthesis_calls.load(Ordering::SeqCst),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls(Stage::Planner) + self.calls(Stage::Reflection) + self.calls(Stage::Synthesis)
    }

    pub fn synthesis_prompts(&self) -> Vec<String> {
        self.synthesis_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        match stage_of(request) {
            Stage::Planner => {
                self.planner_calls.fetch_add(1, Ordering::SeqCst);
                self.planner.produce()
            }
            Stage::Reflection => {
                self.reflection_calls.fetch_add(1, Ordering::SeqCst);
                self.reflection.produce()
            }
            Stage::Synthesis => {
                self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
                self.synthesis_prompts
                    .lock()
                    .unwrap()
                    .push(request.prompt.clone());
                self.synthesis.produce()
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

pub fn hit(url: &str) -> SearchHit {
    SearchHit::new(
        format!("Result at {}", url),
        url,
        "Adult cats sleep between 12 and 16 hours a day.",
    )
}

/// Search provider with canned hits per query and a call log.
#[derive(Default)]
pub struct SpySearch {
    hits: HashMap<String, Vec<SearchHit>>,
    default_hits: Vec<SearchHit>,
    failing: HashSet<String>,
    fail_all: bool,
    rate_limit_all: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl SpySearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits for any query without specific hits
    pub fn default_urls(mut self, urls: &[&str]) -> Self {
        self.default_hits = urls.iter().map(|u| hit(u)).collect();
        self
    }

    pub fn urls_for(mut self, query: &str, urls: &[&str]) -> Self {
        self.hits
            .insert(query.to_string(), urls.iter().map(|u| hit(u)).collect());
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Every call answers as if the provider returned 429
    pub fn rate_limit_all(mut self) -> Self {
        self.rate_limit_all = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls().into_iter().map(|(q, _)| q).collect()
    }
}

#[async_trait]
impl SearchProvider for SpySearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.rate_limit_all {
            return Err(ResearchError::RateLimited {
                provider: "spy".to_string(),
            });
        }
        if self.fail_all || self.failing.contains(query) {
            return Err(ResearchError::ServerError {
                provider: "spy".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let hits = self
            .hits
            .get(query)
            .unwrap_or(&self.default_hits)
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect();
        Ok(hits)
    }

    fn name(&self) -> &str {
        "spy"
    }
}

/// Default config with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> ResearchConfig {
    ResearchConfig::default()
        .with_retry(RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)))
}

pub fn workflow(model: Arc<ScriptedModel>, search: Arc<SpySearch>) -> ResearchWorkflow {
    workflow_with_config(model, search, fast_config())
}

pub fn workflow_with_config(
    model: Arc<ScriptedModel>,
    search: Arc<SpySearch>,
    config: ResearchConfig,
) -> ResearchWorkflow {
    ResearchWorkflow::builder()
        .model(model)
        .search_provider(search)
        .config(config)
        .build()
        .expect("workflow should build")
}
