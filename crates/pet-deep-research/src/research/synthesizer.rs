//! Synthesis: compile every result into the final cited answer
//!
//! Unlike planning and reflection there is no fallback here; a failed or
//! empty generation fails the run.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::citations::{footnote_references, strip_footnotes, CitationList};
use super::prompts::ResearchPrompts;
use super::state::{ResearchAnswer, ResearchQuestion, ResultSet};
use crate::config::Language;
use crate::error::{ResearchError, Result};
use crate::llm::{GenerateRequest, LanguageModel};
use crate::retry::RetryPolicy;

pub struct Synthesizer {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    temperature: f64,
    max_output_tokens: u32,
    language: Language,
}

impl Synthesizer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        retry: RetryPolicy,
        temperature: f64,
        max_output_tokens: u32,
        language: Language,
    ) -> Self {
        Self {
            model,
            retry,
            temperature,
            max_output_tokens,
            language,
        }
    }

    pub async fn synthesize(
        &self,
        question: &ResearchQuestion,
        results: &ResultSet,
        cancel: &CancellationToken,
    ) -> Result<ResearchAnswer> {
        let citations = CitationList::from_results(results);
        let request = GenerateRequest::new(ResearchPrompts::synthesis(
            question,
            results,
            &citations,
            self.language,
        ))
        .with_temperature(self.temperature)
        .with_max_output_tokens(self.max_output_tokens);

        debug!(
            results = results.len(),
            citations = citations.len(),
            prompt_chars = request.prompt.chars().count(),
            "Synthesizing answer"
        );

        let model = &self.model;
        let request = &request;
        let raw = self
            .retry
            .execute("synthesize", cancel, move || model.generate(request))
            .await?;

        let answer_md = finalize_answer(&raw, &citations, self.language)?;
        info!(
            citations = citations.len(),
            references = footnote_references(&answer_md).len(),
            "Answer synthesized"
        );

        Ok(ResearchAnswer {
            answer_md,
            citations: citations.into_vec(),
        })
    }
}

/// Enforce the answer contract on raw model output.
///
/// Out-of-range footnote markers and all model-written definitions are
/// removed, the disclaimer is added unless already present, and the
/// canonical `[^n]: url` definitions are appended.
pub fn finalize_answer(raw: &str, citations: &CitationList, language: Language) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResearchError::Synthesis(
            "model returned an empty answer".to_string(),
        ));
    }

    let mut answer = strip_footnotes(raw, citations.len()).trim_end().to_string();

    let disclaimer = language.disclaimer();
    if !answer.contains(disclaimer) {
        answer.push_str("\n\n");
        answer.push_str(disclaimer);
    }

    if !citations.is_empty() {
        answer.push_str("\n\n");
        answer.push_str(&citations.definitions());
    }

    Ok(answer)
}
