//! Language-model abstraction
//!
//! The workflow talks to a model through [`LanguageModel::generate`]: a
//! prompt in, text out. Requests that carry a JSON schema ask for
//! constrained JSON output; providers with a native JSON mode use it, others
//! fall back to an instruction appended to the prompt.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    /// Full prompt text
    pub prompt: String,
    /// JSON schema the response must follow; `None` for free-text markdown
    pub schema: Option<Value>,
    /// Sampling temperature override
    pub temperature: Option<f64>,
    /// Output token cap override
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Request structured JSON output following `schema`
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn expects_json(&self) -> bool {
        self.schema.is_some()
    }

    /// Prompt text for providers without a native JSON mode.
    pub fn prompt_with_json_instruction(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}\n\nRespond with a single JSON value and nothing else (no markdown fences). It must match this JSON schema:\n{}",
                self.prompt, schema
            ),
            None => self.prompt.clone(),
        }
    }
}

/// A text-generation service.
///
/// Implementations map transport and HTTP failures onto
/// [`ResearchError`](crate::error::ResearchError) variants so the retry
/// policy and the caller can tell transient failures, rate limits and
/// permanent failures apart. Retrying is the caller's job.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier for logging
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = GenerateRequest::new("hello")
            .with_temperature(0.3)
            .with_max_output_tokens(500);

        assert_eq!(request.prompt, "hello");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_output_tokens, Some(500));
        assert!(!request.expects_json());
        assert_eq!(request.prompt_with_json_instruction(), "hello");
    }

    #[test]
    fn test_json_instruction_includes_schema() {
        let request = GenerateRequest::new("plan").with_schema(json!({
            "type": "OBJECT",
            "properties": {"queries": {"type": "ARRAY"}}
        }));

        let prompt = request.prompt_with_json_instruction();
        assert!(prompt.starts_with("plan"));
        assert!(prompt.contains("JSON schema"));
        assert!(prompt.contains("\"queries\""));
    }
}
