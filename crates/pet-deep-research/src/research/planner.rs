//! Query planning: question to a small set of web queries
//!
//! Planning never fails the run. Unreadable output or a provider failure
//! falls back to searching the question alone; only cancellation is
//! returned as an error.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::prompts::ResearchPrompts;
use super::state::{QuerySet, ResearchQuestion};
use crate::error::Result;
use crate::llm::{extract_json, scalar_text, GenerateRequest, LanguageModel};
use crate::retry::RetryPolicy;

/// Planned queries, plus why planning fell back if it did.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub queries: QuerySet,
    pub fallback_reason: Option<String>,
}

impl QueryPlan {
    fn fallback(question: &ResearchQuestion, reason: impl Into<String>) -> Self {
        Self {
            queries: QuerySet::fallback(question),
            fallback_reason: Some(reason.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// `{"queries": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlannerOutput {
    List(Vec<Value>),
    Object {
        #[serde(default)]
        queries: Vec<Value>,
    },
}

/// Non-blank queries from model output; `None` if unreadable.
pub fn parse_planned_queries(text: &str) -> Option<Vec<String>> {
    let output: PlannerOutput = extract_json(text).ok()?;
    let raw = match output {
        PlannerOutput::Object { queries } => queries,
        PlannerOutput::List(queries) => queries,
    };
    Some(
        raw.into_iter().filter_map(scalar_text).collect(),
    )
}

pub struct QueryPlanner {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    temperature: f64,
}

impl QueryPlanner {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy, temperature: f64) -> Self {
        Self {
            model,
            retry,
            temperature,
        }
    }

    pub async fn plan(
        &self,
        question: &ResearchQuestion,
        cancel: &CancellationToken,
    ) -> Result<QueryPlan> {
        let request = GenerateRequest::new(ResearchPrompts::planner(question))
            .with_schema(ResearchPrompts::planner_schema())
            .with_temperature(self.temperature);

        let model = &self.model;
        let request = &request;
        let text = match self
            .retry
            .execute("plan_queries", cancel, move || model.generate(request))
            .await
        {
            Ok(text) => text,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Query planning failed, searching the question only");
                return Ok(QueryPlan::fallback(question, format!("planner call failed: {}", e)));
            }
        };

        let suggestions = match parse_planned_queries(&text) {
            Some(s) if !s.is_empty() => s,
            Some(_) => {
                warn!("Planner returned no queries, searching the question only");
                return Ok(QueryPlan::fallback(question, "planner returned no queries"));
            }
            None => {
                warn!(output = %text, "Unreadable planner output, searching the question only");
                return Ok(QueryPlan::fallback(question, "planner output was not valid JSON"));
            }
        };

        let queries = QuerySet::planned(question, &suggestions);
        info!(queries = ?queries.as_slice(), "Planned search queries");
        Ok(QueryPlan {
            queries,
            fallback_reason: None,
        })
    }
}
