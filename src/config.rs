//! # Configuration Module
//!
//! Loads the CLI configuration from environment variables (and `.env`).
//! API keys are not read here: each provider client reads its own keys
//! when it is built, so a missing key fails fast at startup.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use pet_deep_research::{Language, ResearchConfig, RetryPolicy, SearchDispatch};

// =============================================================================
// PROVIDER SELECTION
// =============================================================================
/// Which language model answers the workflow's prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            other => anyhow::bail!("LLM_PROVIDER must be 'gemini' or 'ollama', got: {}", other),
        }
    }
}

/// Which web search backend serves the queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Perplexity,
    Tavily,
}

impl FromStr for SearchBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perplexity" => Ok(SearchBackend::Perplexity),
            "tavily" => Ok(SearchBackend::Tavily),
            other => anyhow::bail!(
                "SEARCH_PROVIDER must be 'perplexity' or 'tavily', got: {}",
                other
            ),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: LlmProvider,

    /// Gemini model id (e.g. "gemini-2.5-flash")
    pub gemini_model: String,

    /// The Ollama model to use (e.g. "llama3.2"); also drives `--agent` mode
    pub ollama_model: String,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    pub search_backend: SearchBackend,

    /// Retries after the first attempt for every model and search call
    pub max_retries: u32,

    /// Pause between queries; 0 sends a round's queries concurrently
    pub search_spacing_ms: u64,

    /// Wall-clock limit for a whole research run, in seconds
    pub deadline_secs: Option<u64>,

    pub language: Language,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::Gemini,
            gemini_model: "gemini-2.5-flash".to_string(),
            ollama_model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            search_backend: SearchBackend::Perplexity,
            max_retries: 2,
            search_spacing_ms: 0,
            deadline_secs: Some(120),
            language: Language::English,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; set but unparseable ones are
    /// errors.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("LLM_PROVIDER") {
            config.llm_provider = val.parse()?;
        }

        if let Ok(val) = env::var("GEMINI_MODEL") {
            config.gemini_model = val;
        }

        if let Ok(val) = env::var("OLLAMA_MODEL") {
            config.ollama_model = val;
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Ok(val) = env::var("SEARCH_PROVIDER") {
            config.search_backend = val.parse()?;
        }

        if let Ok(val) = env::var("RESEARCH_MAX_RETRIES") {
            config.max_retries = val
                .parse()
                .context("RESEARCH_MAX_RETRIES must be a non-negative integer")?;
        }

        if let Ok(val) = env::var("RESEARCH_SEARCH_SPACING_MS") {
            config.search_spacing_ms = val
                .parse()
                .context("RESEARCH_SEARCH_SPACING_MS must be a non-negative integer")?;
        }

        if let Ok(val) = env::var("RESEARCH_DEADLINE_SECS") {
            config.deadline_secs = parse_deadline(&val)
                .context("RESEARCH_DEADLINE_SECS must be a positive integer or 'none'")?;
        }

        if let Ok(val) = env::var("ANSWER_LANGUAGE") {
            config.language = val
                .parse()
                .context("ANSWER_LANGUAGE must be 'en' or 'zh'")?;
        }

        Ok(config)
    }

    /// Validate the configuration before any client is built.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > 5 {
            anyhow::bail!(
                "RESEARCH_MAX_RETRIES must be at most 5, got: {}",
                self.max_retries
            );
        }

        if self.deadline_secs == Some(0) {
            anyhow::bail!("RESEARCH_DEADLINE_SECS must be at least 1");
        }

        match self.llm_provider {
            LlmProvider::Gemini if self.gemini_model.trim().is_empty() => {
                anyhow::bail!("GEMINI_MODEL cannot be empty")
            }
            LlmProvider::Ollama if self.ollama_model.trim().is_empty() => {
                anyhow::bail!("OLLAMA_MODEL cannot be empty")
            }
            _ => {}
        }

        Ok(())
    }

    /// Workflow settings derived from this configuration.
    pub fn research_config(&self) -> ResearchConfig {
        let dispatch = if self.search_spacing_ms == 0 {
            SearchDispatch::Concurrent
        } else {
            SearchDispatch::Sequential {
                spacing: Duration::from_millis(self.search_spacing_ms),
            }
        };

        let mut research = ResearchConfig::default()
            .with_retry(RetryPolicy::new(self.max_retries))
            .with_dispatch(dispatch)
            .with_language(self.language);
        research.deadline = self.deadline_secs.map(Duration::from_secs);
        research
    }
}

/// "none" or an empty value disables the deadline.
fn parse_deadline(val: &str) -> Result<Option<u64>> {
    let val = val.trim();
    if val.eq_ignore_ascii_case("none") || val.is_empty() {
        return Ok(None);
    }
    Ok(Some(val.parse()?))
}
