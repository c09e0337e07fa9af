//! Prompt templates for the research workflow
//!
//! - Planner: question to a few web queries (JSON)
//! - Reflection: is the evidence enough, and what to search next (JSON)
//! - Synthesis: cited markdown answer with fixed sections
//!
//! Schemas use the OpenAPI subset accepted by Gemini's `responseSchema`.

use chrono::Utc;
use serde_json::{json, Value};

use super::citations::CitationList;
use super::state::{ResearchQuestion, ResultSet};
use crate::config::{Language, MAX_PROMPT_RESULTS, MAX_SNIPPET_CHARS};

/// Prompt templates for the research workflow
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Get the current date formatted for prompts
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    pub fn planner(question: &ResearchQuestion) -> String {
        format!(
            r#"You are planning web research for a pet-health question. For context, today's date is {date}.

Generate 2-3 concise web search queries that together cover the likely causes, home care and warning signs for this question.
- Write the queries in English, even if the question is in another language, for broader web coverage.
- Keep each query short (under 12 words) and specific to the animal and symptom.
- Do not repeat the question verbatim.

Return JSON {{"queries": string[]}}.

Question: {question}"#,
            date = Self::current_date(),
            question = question,
        )
    }

    pub fn planner_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "queries": {"type": "ARRAY", "items": {"type": "STRING"}}
            },
            "required": ["queries"]
        })
    }

    pub fn reflection(question: &ResearchQuestion, results: &ResultSet) -> String {
        format!(
            r#"You are reviewing web research gathered for a pet-health question.

Decide whether the snippets below are enough to answer the question with possible causes, home care advice and clear guidance on when to see a vet.
- If they are enough, set "needMore" to false.
- If important aspects are missing, set "needMore" to true and give up to 2 new English search queries that fill the gaps. Do not repeat queries already covered.

Return JSON {{"needMore": boolean, "queries": string[]}}.

Question: {question}

Snippets:
{snippets}"#,
            question = question,
            snippets = render_evidence(results, None),
        )
    }

    pub fn reflection_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "needMore": {"type": "BOOLEAN"},
                "queries": {"type": "ARRAY", "items": {"type": "STRING"}}
            },
            "required": ["needMore"]
        })
    }

    pub fn synthesis(
        question: &ResearchQuestion,
        results: &ResultSet,
        citations: &CitationList,
        language: Language,
    ) -> String {
        let sections = language
            .required_sections()
            .iter()
            .map(|s| format!("## {}", s))
            .collect::<Vec<_>>()
            .join("\n");

        let citation_rules = if citations.is_empty() {
            "No citable sources are available. Do not use footnote markers.".to_string()
        } else {
            format!(
                "Cite sources inline with markdown footnote markers like [^1], using only the numbers 1 to {} from the list below. Do not write the footnote definitions yourself; they are added automatically.\n\nCitations:\n{}",
                citations.len(),
                citations.definitions()
            )
        };

        format!(
            r#"You are a caring pet-health assistant. For context, today's date is {date}.

Based on ALL of the research snippets below, write a concise answer in {language} to the owner's question. Use exactly these section headings, in this order:
{sections}

- Be practical and calm; list concrete home-care steps.
- Under the vet section, name the warning signs that need prompt professional care.
- Do not claim a diagnosis.

{citation_rules}

Question: {question}

Snippets:
{snippets}"#,
            date = Self::current_date(),
            language = language.name(),
            sections = sections,
            citation_rules = citation_rules,
            question = question,
            snippets = render_evidence(results, Some(citations)),
        )
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Render the first [`MAX_PROMPT_RESULTS`] results as title + snippet blocks.
///
/// With `citations`, each block whose URL is cited is labelled with its
/// footnote number so the model can cite it.
pub fn render_evidence(results: &ResultSet, citations: Option<&CitationList>) -> String {
    if results.is_empty() {
        return "(no search results were found)".to_string();
    }

    results
        .iter()
        .take(MAX_PROMPT_RESULTS)
        .map(|r| {
            let label = citations
                .and_then(|c| c.footnote_for(&r.url))
                .map(|n| format!(" [^{}]", n))
                .unwrap_or_default();
            format!(
                "{}{}\n{}",
                r.title.trim(),
                label,
                truncate_chars(r.snippet.trim(), MAX_SNIPPET_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
