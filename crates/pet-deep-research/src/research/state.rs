//! Research run data model
//!
//! Everything here is created fresh for one workflow run and dropped when the
//! answer is returned. Values are immutable once built; collections only grow.
//!
//! # Types
//!
//! | Type | Built by | Bound |
//! |------|----------|-------|
//! | `ResearchQuestion` | caller | non-blank, trimmed |
//! | `QuerySet` | planner, reflection | distinct, at most 3 (2 for follow-ups) |
//! | `ResultSet` | search executor | discovery order, URL duplicates allowed |
//! | `ReflectionVerdict` | reflection | one per run |
//! | `ResearchAnswer` | synthesizer | `[^n]` refers to `citations[n - 1]` |
//! | `ResearchReport` | workflow | answer plus phases and degradations |
//!
//! A run that recovered from something locally (planner or reflection
//! fallback, skipped queries, rate-limited searches, no results) still
//! succeeds; each recovery is listed as a [`Degradation`] on the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::{MAX_FOLLOW_UP_QUERIES, MAX_QUERIES};
use crate::error::{ResearchError, Result};
use crate::search::SearchHit;

/// The user's question, trimmed once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResearchQuestion(String);

impl ResearchQuestion {
    /// Rejects blank questions with [`ResearchError::InvalidQuestion`].
    pub fn new(question: impl Into<String>) -> Result<Self> {
        let question = question.into();
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(ResearchError::InvalidQuestion);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResearchQuestion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResearchQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free search queries for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySet(Vec<String>);

impl QuerySet {
    /// The question alone; used when planning produced nothing usable.
    pub fn fallback(question: &ResearchQuestion) -> Self {
        Self(vec![question.as_str().to_string()])
    }

    /// First-round queries: the question, then model suggestions.
    ///
    /// Suggestions are trimmed, blanks dropped and exact duplicates removed;
    /// the result is truncated to [`MAX_QUERIES`] and always starts with the
    /// question.
    pub fn planned<I, S>(question: &ResearchQuestion, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::fallback(question);
        for suggestion in suggestions {
            if set.0.len() >= MAX_QUERIES {
                break;
            }
            set.push_distinct(suggestion.as_ref());
        }
        set
    }

    /// Follow-up queries from reflection, excluding anything in `executed`.
    ///
    /// Capped at [`MAX_FOLLOW_UP_QUERIES`]; may be empty.
    pub fn follow_up<I, S>(suggestions: I, executed: &QuerySet) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for suggestion in suggestions {
            if set.0.len() >= MAX_FOLLOW_UP_QUERIES {
                break;
            }
            let query = suggestion.as_ref().trim();
            if !executed.contains(query) {
                set.push_distinct(query);
            }
        }
        set
    }

    fn push_distinct(&mut self, query: &str) {
        let query = query.trim();
        if !query.is_empty() && !self.contains(query) {
            self.0.push(query.to_string());
        }
    }

    pub fn contains(&self, query: &str) -> bool {
        self.0.iter().any(|q| q == query)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// A normalized search result tagged with the query that found it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published_date: Option<String>,
    pub source_query: String,
}

impl SearchResult {
    pub fn from_hit(hit: SearchHit, source_query: impl Into<String>) -> Self {
        Self {
            title: hit.title,
            url: hit.url,
            snippet: hit.snippet,
            published_date: hit.date,
            source_query: source_query.into(),
        }
    }
}

/// Results in discovery order. Duplicate URLs are kept; citations dedupe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<SearchResult>);

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: SearchResult) {
        self.0.push(result);
    }

    /// Append another round's results after the existing ones.
    pub fn append(&mut self, other: ResultSet) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[SearchResult] {
        &self.0
    }
}

impl FromIterator<SearchResult> for ResultSet {
    fn from_iter<I: IntoIterator<Item = SearchResult>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Outcome of the single reflection step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionVerdict {
    pub need_more: bool,
    pub follow_up_queries: QuerySet,
}

impl ReflectionVerdict {
    /// Evidence is sufficient (also the fallback verdict).
    pub fn sufficient() -> Self {
        Self::default()
    }

    /// Whether the follow-up round should run: reflection asked for more
    /// and left at least one new query.
    pub fn should_search_again(&self) -> bool {
        self.need_more && !self.follow_up_queries.is_empty()
    }
}

/// The answer handed to callers.
///
/// Footnote `[^n]` in `answer_md` refers to `citations[n - 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchAnswer {
    pub answer_md: String,
    pub citations: Vec<String>,
}

/// Workflow states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    PlanningQueries,
    Searching,
    Reflecting,
    AdditionalSearching,
    Synthesizing,
    Done,
}

impl ResearchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanningQueries => "planning_queries",
            Self::Searching => "searching",
            Self::Reflecting => "reflecting",
            Self::AdditionalSearching => "additional_searching",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure the workflow recovered from locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Planning failed or returned nothing usable; only the question was searched
    PlannerFallback { reason: String },
    /// Reflection failed or was unreadable; treated as "enough evidence"
    ReflectionFallback { reason: String },
    /// Some queries of a round failed and were skipped; `rate_limited`
    /// counts the failures that were 429s
    SearchFailures {
        phase: ResearchPhase,
        failed: usize,
        rate_limited: usize,
        attempted: usize,
    },
    /// Synthesis ran without any search results
    NoResults,
}

/// The answer plus a trace of how the run produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub run_id: Uuid,
    pub question: String,
    pub answer: ResearchAnswer,
    pub queries: QuerySet,
    pub follow_up_queries: QuerySet,
    pub need_more: bool,
    pub search_rounds: u32,
    pub total_results: usize,
    pub phases: Vec<ResearchPhase>,
    pub degradations: Vec<Degradation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ResearchReport {
    /// Whether anything was recovered from locally during the run.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Whether any search query was dropped because the provider kept
    /// answering 429.
    pub fn search_rate_limited(&self) -> bool {
        self.degradations.iter().any(|d| {
            matches!(d, Degradation::SearchFailures { rate_limited, .. } if *rate_limited > 0)
        })
    }

    pub fn into_answer(self) -> ResearchAnswer {
        self.answer
    }
}
