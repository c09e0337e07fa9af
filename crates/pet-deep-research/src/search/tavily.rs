//! Tavily Search API client
//!
//! Alternative search backend. Search depth and topic are fixed per client;
//! the per-call `max_results` comes from the executor.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{SearchHit, SearchProvider};
use crate::error::{ResearchError, Result};
use crate::keys::ApiKeyRing;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const MAX_RESULTS_LIMIT: u32 = 20;

const PROVIDER: &str = "tavily";

pub const TAVILY_KEY_VAR: &str = "TAVILY_API_KEY";

/// Search depth for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast search with basic results
    #[default]
    Basic,
    /// More thorough search with detailed results
    Advanced,
}

/// Topic filter for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// General web search
    #[default]
    General,
    /// Recent news articles
    News,
}

pub struct TavilySearch {
    keys: ApiKeyRing,
    client: Client,
    base_url: String,
    timeout: Duration,
    search_depth: SearchDepth,
    topic: Topic,
}

impl TavilySearch {
    pub fn new(keys: ApiKeyRing) -> Self {
        Self {
            keys,
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search_depth: SearchDepth::default(),
            topic: Topic::default(),
        }
    }

    /// Create from environment variable TAVILY_API_KEY
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(TAVILY_KEY_VAR).ok();
        Ok(Self::new(ApiKeyRing::new(PROVIDER, key)?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_search_depth(mut self, depth: SearchDepth) -> Self {
        self.search_depth = depth;
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = topic;
        self
    }

    async fn search_with_key(&self, key: &str, request: &TavilyRequest<'_>) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ResearchError::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResearchError::from_status(PROVIDER, status.as_u16(), error_text));
        }

        let tavily_response: TavilyResponse =
            response
                .json()
                .await
                .map_err(|e| ResearchError::MalformedResponse {
                    provider: PROVIDER.to_string(),
                    message: e.to_string(),
                })?;

        Ok(tavily_response
            .results
            .into_iter()
            .filter_map(TavilyResult::into_hit)
            .collect())
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            query,
            max_results: max_results.clamp(1, MAX_RESULTS_LIMIT),
            search_depth: self.search_depth,
            topic: self.topic,
            include_answer: false,
            include_raw_content: false,
        };
        debug!(query, max_results = request.max_results, "Tavily search");

        let request = &request;
        self.keys
            .with_rotation(move |key| async move { self.search_with_key(&key, request).await })
            .await
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Request body for Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: SearchDepth,
    topic: Topic,
    include_answer: bool,
    include_raw_content: bool,
}

/// Response from Tavily API
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Individual search result; items without a URL are dropped
#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: Option<String>,
    url: Option<String>,
    /// Extracted content/snippet
    content: Option<String>,
    /// Only present for the news topic
    published_date: Option<String>,
}

impl TavilyResult {
    fn into_hit(self) -> Option<SearchHit> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        Some(SearchHit {
            title: self.title.unwrap_or_default(),
            url,
            snippet: self.content.unwrap_or_default(),
            date: self.published_date,
        })
    }
}
