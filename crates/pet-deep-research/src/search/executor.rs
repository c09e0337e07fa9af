//! Runs one round of queries against a search provider
//!
//! Each query gets its own retry budget. A query that still fails is logged
//! and skipped; only cancellation ends the round with an error. Results are
//! merged in query order regardless of completion order.

use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SearchHit, SearchProvider};
use crate::config::SearchDispatch;
use crate::error::{ResearchError, Result};
use crate::research::state::{QuerySet, ResultSet, SearchResult};
use crate::retry::RetryPolicy;

/// Results of one search round.
#[derive(Debug, Clone, Default)]
pub struct SearchRound {
    pub results: ResultSet,
    /// Queries that failed after retries, in query order
    pub failed_queries: Vec<String>,
    /// How many of the failed queries ended rate limited
    pub rate_limited: usize,
    pub attempted: usize,
}

impl SearchRound {
    pub fn has_failures(&self) -> bool {
        !self.failed_queries.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed_queries.len() == self.attempted
    }
}

#[derive(Clone)]
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    retry: RetryPolicy,
    dispatch: SearchDispatch,
}

impl SearchExecutor {
    pub fn new(provider: Arc<dyn SearchProvider>, retry: RetryPolicy, dispatch: SearchDispatch) -> Self {
        Self {
            provider,
            retry,
            dispatch,
        }
    }

    /// Search every query in `queries`, asking for `max_results` per query.
    pub async fn execute(
        &self,
        queries: &QuerySet,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchRound> {
        let outcomes = match self.dispatch {
            SearchDispatch::Concurrent => {
                join_all(queries.iter().map(|q| self.search_one(q, max_results, cancel))).await
            }
            SearchDispatch::Sequential { spacing } => {
                let mut outcomes = Vec::with_capacity(queries.len());
                for (i, query) in queries.iter().enumerate() {
                    if i > 0 && !spacing.is_zero() {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(ResearchError::Cancelled),
                            _ = tokio::time::sleep(spacing) => {}
                        }
                    }
                    outcomes.push(self.search_one(query, max_results, cancel).await);
                }
                outcomes
            }
        };

        let mut round = SearchRound {
            attempted: queries.len(),
            ..Default::default()
        };

        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => {
                    debug!(query, hits = hits.len(), "Search query succeeded");
                    for hit in hits {
                        round.results.push(SearchResult::from_hit(hit, query));
                    }
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        query,
                        error = %e,
                        "Search query failed, skipping"
                    );
                    if e.is_rate_limited() {
                        round.rate_limited += 1;
                    }
                    round.failed_queries.push(query.to_string());
                }
            }
        }

        info!(
            provider = self.provider.name(),
            queries = round.attempted,
            failed = round.failed_queries.len(),
            rate_limited = round.rate_limited,
            results = round.results.len(),
            "Search round complete"
        );
        Ok(round)
    }

    async fn search_one(
        &self,
        query: &str,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        let provider = &self.provider;
        self.retry
            .execute("search", cancel, move || provider.search(query, max_results))
            .await
    }
}
