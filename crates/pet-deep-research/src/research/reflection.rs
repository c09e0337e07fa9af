//! Reflection: decide once whether the evidence needs a follow-up round
//!
//! Any doubt resolves toward "enough": unreadable output and provider
//! failures both yield `need_more = false`.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::prompts::ResearchPrompts;
use super::state::{QuerySet, ReflectionVerdict, ResearchQuestion, ResultSet};
use crate::error::Result;
use crate::llm::{extract_json, scalar_text, GenerateRequest, LanguageModel};
use crate::retry::RetryPolicy;

/// Reflection verdict, plus why reflection fell back if it did.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub verdict: ReflectionVerdict,
    pub fallback_reason: Option<String>,
}

impl Reflection {
    fn fallback(reason: impl Into<String>) -> Self {
        Self {
            verdict: ReflectionVerdict::sufficient(),
            fallback_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReflectionOutput {
    #[serde(rename = "needMore", alias = "need_more")]
    need_more: bool,
    #[serde(default, alias = "newQueries")]
    queries: Option<Vec<Value>>,
}

/// Parse `{needMore, queries | newQueries}`; `None` if unreadable.
pub fn parse_reflection(text: &str) -> Option<(bool, Vec<String>)> {
    let output: ReflectionOutput = extract_json(text).ok()?;
    let queries = output
        .queries
        .unwrap_or_default()
        .into_iter()
        .filter_map(scalar_text)
        .collect();
    Some((output.need_more, queries))
}

pub struct ReflectionEngine {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    temperature: f64,
}

impl ReflectionEngine {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy, temperature: f64) -> Self {
        Self {
            model,
            retry,
            temperature,
        }
    }

    /// Judge `results` against `question`. Follow-up queries exclude
    /// everything in `executed`.
    pub async fn reflect(
        &self,
        question: &ResearchQuestion,
        results: &ResultSet,
        executed: &QuerySet,
        cancel: &CancellationToken,
    ) -> Result<Reflection> {
        let request = GenerateRequest::new(ResearchPrompts::reflection(question, results))
            .with_schema(ResearchPrompts::reflection_schema())
            .with_temperature(self.temperature);

        let model = &self.model;
        let request = &request;
        let text = match self
            .retry
            .execute("reflect", cancel, move || model.generate(request))
            .await
        {
            Ok(text) => text,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Reflection failed, proceeding to synthesis");
                return Ok(Reflection::fallback(format!("reflection call failed: {}", e)));
            }
        };

        let Some((need_more, suggestions)) = parse_reflection(&text) else {
            warn!(output = %text, "Unreadable reflection output, proceeding to synthesis");
            return Ok(Reflection::fallback("reflection output was not valid JSON"));
        };

        let follow_up_queries = if need_more {
            QuerySet::follow_up(&suggestions, executed)
        } else {
            QuerySet::default()
        };

        info!(
            need_more,
            follow_up = ?follow_up_queries.as_slice(),
            "Reflection complete"
        );
        Ok(Reflection {
            verdict: ReflectionVerdict {
                need_more,
                follow_up_queries,
            },
            fallback_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResearchError;
    use crate::research::state::SearchResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedModel {
        response: std::result::Result<String, fn() -> ResearchError>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(err: fn() -> ResearchError) -> Arc<Self> {
            Arc::new(Self {
                response: Err(err),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-1"
        }
    }

    fn engine(model: Arc<FixedModel>) -> ReflectionEngine {
        ReflectionEngine::new(
            model,
            RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)),
            0.3,
        )
    }

    fn question() -> ResearchQuestion {
        ResearchQuestion::new("Is my dog's vomiting serious?").unwrap()
    }

    fn results() -> ResultSet {
        [SearchResult {
            title: "Dog vomiting".to_string(),
            url: "https://example.com/dog".to_string(),
            snippet: "Usually mild".to_string(),
            published_date: None,
            source_query: "dog vomiting".to_string(),
        }]
        .into_iter()
        .collect()
    }

    async fn reflect(model: Arc<FixedModel>) -> Reflection {
        let executed = QuerySet::planned(&question(), ["dog vomiting"]);
        engine(model)
            .reflect(&question(), &results(), &executed, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            parse_reflection(r#"{"needMore": true, "queries": ["a"]}"#),
            Some((true, vec!["a".to_string()]))
        );
        assert_eq!(
            parse_reflection("```json\n{\"needMore\": true, \"newQueries\": [\"b\"]}\n```"),
            Some((true, vec!["b".to_string()]))
        );
        assert_eq!(
            parse_reflection(r#"{"needMore": false, "queries": null}"#),
            Some((false, vec![]))
        );
        assert_eq!(parse_reflection(r#"{"queries": ["a"]}"#), None);
        assert_eq!(parse_reflection("maybe"), None);
    }

    #[tokio::test]
    async fn test_need_more_with_follow_ups() {
        let reflection = reflect(FixedModel::ok(
            r#"{"needMore": true, "queries": ["dog vomiting", "dog vomiting yellow bile", "dog vomiting when to see vet", "third"]}"#,
        ))
        .await;

        assert!(reflection.verdict.need_more);
        assert_eq!(
            reflection.verdict.follow_up_queries.as_slice(),
            ["dog vomiting yellow bile", "dog vomiting when to see vet"]
        );
        assert!(reflection.verdict.should_search_again());
        assert!(reflection.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_enough_evidence_ignores_queries() {
        let reflection = reflect(FixedModel::ok(r#"{"needMore": false, "queries": ["x"]}"#)).await;
        assert!(!reflection.verdict.need_more);
        assert!(reflection.verdict.follow_up_queries.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_output_means_no_more() {
        let reflection = reflect(FixedModel::ok("I think we need more")).await;
        assert_eq!(reflection.verdict, ReflectionVerdict::sufficient());
        assert!(reflection.fallback_reason.is_some());
    }

    #[tokio::test]
    async fn test_provider_failure_means_no_more() {
        let model = FixedModel::err(|| ResearchError::Timeout {
            provider: "fixed".to_string(),
        });
        let reflection = reflect(model.clone()).await;
        assert!(!reflection.verdict.need_more);
        assert!(reflection.fallback_reason.is_some());
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }
}
