//! Adapter for using any rig-core agent as a [`LanguageModel`]
//!
//! Rig covers providers we do not talk to directly (Ollama, OpenAI,
//! Anthropic, ...). Rig agents have no per-request JSON mode here, so
//! structured requests are expressed as a prompt instruction and parsed
//! leniently by the caller.
//!
//! ```rust,ignore
//! use rig::client::{CompletionClient, ProviderClient};
//! use rig::providers::ollama;
//!
//! let client = ollama::Client::from_env();
//! let agent = client.agent("llama3.2").temperature(0.3).build();
//! let model = RigModel::new(agent, "ollama", "llama3.2");
//! ```

use async_trait::async_trait;
use rig::agent::Agent;
use rig::completion::{CompletionModel, Prompt};

use super::provider::{GenerateRequest, LanguageModel};
use crate::error::{ResearchError, Result};

pub struct RigModel<M>
where
    M: CompletionModel,
{
    agent: Agent<M>,
    provider_name: String,
    model_name: String,
}

impl<M> RigModel<M>
where
    M: CompletionModel,
{
    /// Wrap a built rig agent; the names are only used for logging.
    pub fn new(
        agent: Agent<M>,
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            provider_name: provider_name.into(),
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl<M> LanguageModel for RigModel<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let prompt = request.prompt_with_json_instruction();

        self.agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| upstream_error(&self.provider_name, e.to_string()))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}

/// Rig reports provider failures as text; a rate limit is recognised by its
/// status code or wording.
fn upstream_error(provider: &str, message: String) -> ResearchError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        ResearchError::RateLimited {
            provider: provider.to_string(),
        }
    } else {
        ResearchError::Upstream {
            provider: provider.to_string(),
            message,
        }
    }
}
