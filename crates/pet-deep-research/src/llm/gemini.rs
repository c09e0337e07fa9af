//! Gemini `generateContent` client
//!
//! Talks to the Generative Language REST API directly so JSON mode
//! (`responseMimeType` + `responseSchema`) is available for the planning
//! and reflection calls.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::provider::{GenerateRequest, LanguageModel};
use crate::error::{ResearchError, Result};
use crate::keys::ApiKeyRing;

/// Default model for every workflow call
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default timeout for a single generateContent request
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const PROVIDER: &str = "gemini";

/// Environment variables holding Gemini keys, in rotation order
pub const GEMINI_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GEMINI_API_KEY_BACKUP", "GEMINI_API_KEY_2"];

pub struct GeminiModel {
    keys: ApiKeyRing,
    client: Client,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiModel {
    pub fn new(keys: ApiKeyRing) -> Self {
        Self {
            keys,
            client: Client::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create from `GEMINI_API_KEY` (plus the optional backup keys).
    pub fn from_env() -> Result<Self> {
        let keys = GEMINI_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok());
        Ok(Self::new(ApiKeyRing::new(PROVIDER, keys)?))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at another endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn generate_with_key(&self, key: &str, request: &GenerateRequest) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateContentRequest::from_request(request);

        debug!(model = %self.model, json = request.expects_json(), "Calling Gemini");

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResearchError::from_status(PROVIDER, status.as_u16(), error_text));
        }

        let data: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ResearchError::MalformedResponse {
                    provider: PROVIDER.to_string(),
                    message: e.to_string(),
                })?;

        data.text().ok_or_else(|| ResearchError::MalformedResponse {
            provider: PROVIDER.to_string(),
            message: "response contained no text candidates".to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.keys
            .with_rotation(move |key| async move { self.generate_with_key(&key, request).await })
            .await
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: request.schema.as_ref().map(|_| "application/json"),
                response_schema: request.schema.as_ref(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_json_mode() {
        let request = GenerateRequest::new("plan queries")
            .with_schema(json!({"type": "OBJECT"}))
            .with_temperature(0.3);
        let body = serde_json::to_value(GenerateContentRequest::from_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "plan queries");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(body["generationConfig"]["temperature"], 0.3);
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_request_body_free_text() {
        let request = GenerateRequest::new("write").with_max_output_tokens(8000);
        let body = serde_json::to_value(GenerateContentRequest::from_request(&request)).unwrap();

        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8000);
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let data: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world"}]}}]
        }))
        .unwrap();
        assert_eq!(data.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_response_without_candidates() {
        let data: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(data.text().is_none());
    }

    #[test]
    fn test_from_env_requires_key() {
        for var in GEMINI_KEY_VARS {
            std::env::remove_var(var);
        }
        assert!(matches!(
            GeminiModel::from_env(),
            Err(ResearchError::Config(_))
        ));
    }
}
