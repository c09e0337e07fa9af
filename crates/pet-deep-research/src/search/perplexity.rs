//! Perplexity Search API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{SearchHit, SearchProvider};
use crate::error::{ResearchError, Result};
use crate::keys::ApiKeyRing;

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Default timeout for Perplexity API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page content budget per result
const MAX_TOKENS_PER_PAGE: u32 = 1024;

/// Upper bound the API accepts for `max_results`
const MAX_RESULTS_LIMIT: u32 = 20;

const PROVIDER: &str = "perplexity";

pub const PERPLEXITY_KEY_VAR: &str = "PERPLEXITY_API_KEY";

pub struct PerplexitySearch {
    keys: ApiKeyRing,
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl PerplexitySearch {
    pub fn new(keys: ApiKeyRing) -> Self {
        Self {
            keys,
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create from environment variable `PERPLEXITY_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(PERPLEXITY_KEY_VAR).ok();
        Ok(Self::new(ApiKeyRing::new(PROVIDER, key)?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn search_with_key(&self, key: &str, request: &PerplexityRequest<'_>) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(key)
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

        let data: PerplexityResponse =
            response
                .json()
                .await
                .map_err(|e| ResearchError::MalformedResponse {
                    provider: PROVIDER.to_string(),
                    message: e.to_string(),
                })?;

        Ok(data
            .results
            .into_iter()
            .filter_map(PerplexityResult::into_hit)
            .collect())
    }
}

#[async_trait]
impl SearchProvider for PerplexitySearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let request = PerplexityRequest {
            query,
            max_results: max_results.clamp(1, MAX_RESULTS_LIMIT),
            max_tokens_per_page: MAX_TOKENS_PER_PAGE,
        };
        debug!(query, max_results = request.max_results, "Perplexity search");

        let request = &request;
        self.keys
            .with_rotation(move |key| async move { self.search_with_key(&key, request).await })
            .await
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Debug, Serialize)]
struct PerplexityRequest<'a> {
    query: &'a str,
    max_results: u32,
    max_tokens_per_page: u32,
}

#[derive(Debug, Deserialize)]
struct PerplexityResponse {
    #[serde(default)]
    results: Vec<PerplexityResult>,
}

/// Any field may be missing or null; items without a URL are dropped.
#[derive(Debug, Deserialize)]
struct PerplexityResult {
    title: Option<String>,
    url: Option<String>,
    snippet: Option<String>,
    date: Option<String>,
    last_updated: Option<String>,
}

impl PerplexityResult {
    fn into_hit(self) -> Option<SearchHit> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        Some(SearchHit {
            title: self.title.unwrap_or_default(),
            url,
            snippet: self.snippet.unwrap_or_default(),
            date: self.date.or(self.last_updated),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_prefers_publication_date() {
        let result: PerplexityResult = serde_json::from_value(json!({
            "title": "Cat sleep",
            "url": "https://example.com/cats",
            "snippet": "Cats sleep 12-16 hours",
            "date": "2024-03-01",
            "last_updated": "2024-05-01"
        }))
        .unwrap();
        let hit = result.into_hit().unwrap();
        assert_eq!(hit.date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_result_falls_back_to_last_updated() {
        let result: PerplexityResult = serde_json::from_value(json!({
            "url": "https://example.com/cats",
            "last_updated": "2024-05-01"
        }))
        .unwrap();
        let hit = result.into_hit().unwrap();
        assert_eq!(hit.title, "");
        assert_eq!(hit.date.as_deref(), Some("2024-05-01"));
    }
}

/// HTTP tests against a mocked endpoint
#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PerplexitySearch {
        PerplexitySearch::new(ApiKeyRing::new(PROVIDER, ["test-key"]).unwrap())
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_search_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "query": "cat sleep hours",
                "max_results": 10,
                "max_tokens_per_page": 1024
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "abc",
                "results": [
                    {"title": "How much do cats sleep?", "url": "https://example.com/a", "snippet": "12-16 hours", "date": "2024-01-02"},
                    {"title": "Senior cats", "url": "https://example.com/b", "snippet": "Up to 20 hours"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hits = client(&server).search("cat sleep hours", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://example.com/a");
        assert_eq!(hits[0].date.as_deref(), Some("2024-01-02"));
        assert!(hits[1].date.is_none());
    }

    #[tokio::test]
    async fn test_item_without_url_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "Cat naps", "url": "https://example.com/a", "snippet": "Cats nap often"},
                    {"title": "Broken", "url": null, "snippet": null},
                    {"title": "No link at all"}
                ]
            })))
            .mount(&server)
            .await;

        let hits = client(&server).search("cat naps", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_max_results_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({"max_results": 20})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let hits = client(&server).search("q", 500).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
            .mount(&server)
            .await;

        let err = client(&server).search("q", 5).await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_unauthorized_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).search("q", 5).await.unwrap_err();
        assert!(matches!(err, ResearchError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).search("q", 5).await.unwrap_err();
        assert!(matches!(err, ResearchError::MalformedResponse { .. }));
    }
}
