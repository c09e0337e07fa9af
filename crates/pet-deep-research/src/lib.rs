//! pet-deep-research: iterative research-and-synthesis for pet-health questions
//!
//! A question is expanded into a few web queries, searched, reflected on
//! once (with at most one follow-up round) and synthesized into a cited
//! markdown answer. Every model and search call runs under a bounded
//! exponential-backoff retry.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pet_deep_research::{GeminiModel, PerplexitySearch, ResearchConfig, ResearchWorkflow};
//!
//! let workflow = ResearchWorkflow::builder()
//!     .model(Arc::new(GeminiModel::from_env()?))
//!     .search_provider(Arc::new(PerplexitySearch::from_env()?))
//!     .config(ResearchConfig::default())
//!     .build()?;
//!
//! let answer = workflow.run("Why is my dog eating grass?").await?;
//! // answer.answer_md uses [^n] footnotes; answer.citations[n - 1] is the source
//! ```
//!
//! Any rig-core agent can stand in for Gemini through [`RigModel`], and the
//! workflow can be handed to a rig agent as the `web_research` tool
//! ([`WebResearchTool`]).

pub mod config;
pub mod error;
pub mod keys;
pub mod llm;
pub mod research;
pub mod retry;
pub mod search;
pub mod tools;

// Re-exports for convenience
pub use config::{Language, ResearchConfig, SearchDispatch};
pub use error::{ErrorKind, ResearchError, Result};
pub use keys::ApiKeyRing;
pub use llm::{GeminiModel, GenerateRequest, LanguageModel, RigModel};
pub use research::{
    Degradation, QuerySet, ReflectionVerdict, ResearchAnswer, ResearchPhase, ResearchQuestion,
    ResearchReport, ResearchWorkflow, ResearchWorkflowBuilder, ResultSet, RunOptions,
    SearchResult,
};
pub use retry::RetryPolicy;
pub use search::{PerplexitySearch, SearchHit, SearchProvider, TavilySearch};
pub use tools::WebResearchTool;
