//! Web search providers and the per-round search executor
//!
//! - `perplexity` - Perplexity Search API
//! - `tavily` - Tavily Search API
//! - `executor` - runs a query set against a provider with retry and
//!   partial-failure tolerance
//!
//! Providers return raw [`SearchHit`]s; the executor tags each with the
//! query that found it. Items a provider returns without a URL are dropped
//! at the client, and URL sanitation happens later when citations are built.
//!
//! Providers map HTTP failures onto `ResearchError` so that a 429 stays
//! `RateLimited` after retries and is counted separately in the round.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod executor;
pub mod perplexity;
pub mod tavily;

pub use executor::{SearchExecutor, SearchRound};
pub use perplexity::PerplexitySearch;
pub use tavily::{SearchDepth, TavilySearch, Topic};

/// One result item as returned by a provider, before it is tagged with the
/// query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Publication or last-update date, as the provider formats it
    pub date: Option<String>,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            date: None,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// A web-search service.
///
/// Implementations map 429 to
/// [`ResearchError::RateLimited`](crate::error::ResearchError::RateLimited)
/// so exhausted retries can be reported as "try again later".
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query`, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
