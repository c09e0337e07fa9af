//! # Agent Module
//!
//! Wires the configured model and search providers into a research
//! workflow, and offers two ways to use it:
//! - deep search: run the workflow directly and get a full report
//! - agent mode: a Rig agent that may call the workflow as its
//!   `web_research` tool

use anyhow::{Context, Result};
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::ollama;
use std::sync::Arc;
use tracing::{debug, info};

use pet_deep_research::{
    GeminiModel, LanguageModel, PerplexitySearch, ResearchReport, ResearchWorkflow, RigModel,
    RunOptions, SearchProvider, TavilySearch, WebResearchTool,
};

use crate::config::{Config, LlmProvider, SearchBackend};

// =============================================================================
// SYSTEM PROMPT
// =============================================================================
/// Preamble for agent mode.
const PET_AGENT_SYSTEM_PROMPT: &str = r#"
You are a friendly pet-health assistant. Owners describe what they see in their pets and you help them understand it.

IMPORTANT INSTRUCTIONS:
1. For any question about symptoms, behaviour, diet or care, call the web_research tool ONCE with the owner's question
2. Base your reply on the tool's answer and keep its footnote markers and source list intact
3. For greetings or questions unrelated to pet health, answer briefly without the tool
4. Never present your reply as a veterinary diagnosis; urge a vet visit for emergencies
"#;

/// Ollama client for the configured host.
///
/// Rig 0.27 reads the base URL from `OLLAMA_API_BASE_URL`.
fn ollama_client(config: &Config) -> ollama::Client {
    std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
    ollama::Client::from_env()
}

// =============================================================================
// PROVIDER WIRING
// =============================================================================
/// Build the language model the workflow prompts.
pub fn build_model(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    match config.llm_provider {
        LlmProvider::Gemini => {
            let model = GeminiModel::from_env()
                .context("Gemini selected but no GEMINI_API_KEY is set")?
                .with_model(&config.gemini_model);
            Ok(Arc::new(model))
        }
        LlmProvider::Ollama => {
            let agent = ollama_client(config)
                .agent(&config.ollama_model)
                .temperature(0.3)
                .build();
            debug!(host = %config.ollama_host, model = %config.ollama_model, "Using Ollama");
            Ok(Arc::new(RigModel::new(
                agent,
                "ollama",
                config.ollama_model.clone(),
            )))
        }
    }
}

/// Build the web search backend.
pub fn build_search(config: &Config) -> Result<Arc<dyn SearchProvider>> {
    match config.search_backend {
        SearchBackend::Perplexity => Ok(Arc::new(
            PerplexitySearch::from_env()
                .context("Perplexity selected but PERPLEXITY_API_KEY is not set")?,
        )),
        SearchBackend::Tavily => Ok(Arc::new(
            TavilySearch::from_env().context("Tavily selected but TAVILY_API_KEY is not set")?,
        )),
    }
}

pub fn build_workflow(config: &Config) -> Result<Arc<ResearchWorkflow>> {
    let workflow = ResearchWorkflow::builder()
        .model(build_model(config)?)
        .search_provider(build_search(config)?)
        .config(config.research_config())
        .build()
        .context("Invalid research configuration")?;
    Ok(Arc::new(workflow))
}

// =============================================================================
// RESEARCH AGENT STRUCT
// =============================================================================
pub struct ResearchAgent {
    config: Config,
    workflow: Arc<ResearchWorkflow>,
}

impl ResearchAgent {
    /// Build every provider up front so missing credentials fail before
    /// the first request.
    pub fn new(config: Config) -> Result<Self> {
        let workflow = build_workflow(&config)?;
        Ok(Self { config, workflow })
    }

    /// Run the deep search workflow and return the full report.
    pub async fn research(&self, question: &str, options: &RunOptions) -> Result<ResearchReport> {
        info!(
            llm = ?self.config.llm_provider,
            search = ?self.config.search_backend,
            "Starting deep search"
        );

        let report = self.workflow.run_with(question, options).await?;
        Ok(report)
    }

    /// Let an Ollama agent answer, calling `web_research` when it needs
    /// evidence.
    pub async fn chat(&self, question: &str) -> Result<String> {
        info!(model = %self.config.ollama_model, "Starting agent mode");

        let agent = ollama_client(&self.config)
            .agent(&self.config.ollama_model)
            .preamble(PET_AGENT_SYSTEM_PROMPT)
            .tool(WebResearchTool::new(Arc::clone(&self.workflow)))
            .build();

        let response = agent
            .prompt(question)
            .multi_turn(3)
            .await
            .map_err(|e| anyhow::anyhow!("Agent execution failed: {}", e))?;

        Ok(response)
    }
}
