//! The research workflow state machine
//!
//! # Workflow Structure
//!
//! ```text
//! PlanningQueries ─▶ Searching ─▶ Reflecting ─┬─────────────────────────▶ Synthesizing ─▶ Done
//!                                             │                              ▲
//!                                             └─▶ AdditionalSearching ───────┘
//!                                                 (need_more && follow-ups)
//! ```
//!
//! Reflection runs exactly once, so there is at most one extra search round.
//! Each step hands its output to `successor`, which asks `next_phase` where
//! evidence goes next. A failure anywhere is returned as an `Err`; there is no partial answer.
//!
//! # Usage
//!
//! ```ignore
//! use pet_deep_research::{ResearchWorkflow, ResearchConfig, GeminiModel, PerplexitySearch};
//! use std::sync::Arc;
//!
//! let workflow = ResearchWorkflow::builder()
//!     .model(Arc::new(GeminiModel::from_env()?))
//!     .search_provider(Arc::new(PerplexitySearch::from_env()?))
//!     .config(ResearchConfig::default())
//!     .build()?;
//!
//! let answer = workflow.run("Is it normal for my cat to sleep 16 hours a day?").await?;
//! println!("{}", answer.answer_md);
//! ```

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::planner::QueryPlanner;
use super::reflection::ReflectionEngine;
use super::state::{
    Degradation, QuerySet, ReflectionVerdict, ResearchAnswer, ResearchPhase, ResearchQuestion,
    ResearchReport, ResultSet,
};
use super::synthesizer::Synthesizer;
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use crate::llm::LanguageModel;
use crate::search::{SearchExecutor, SearchProvider, SearchRound};

/// Per-run caller controls.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Cancelling this token aborts pending calls and fails the run with
    /// [`ResearchError::Cancelled`]
    pub cancel: CancellationToken,
    /// Overrides the configured deadline for this run
    pub deadline: Option<Duration>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A workflow state together with the data it carries.
#[derive(Debug, Clone)]
pub enum Step {
    PlanningQueries,
    Searching {
        queries: QuerySet,
    },
    Reflecting {
        executed: QuerySet,
        results: ResultSet,
    },
    AdditionalSearching {
        follow_up: QuerySet,
        results: ResultSet,
    },
    Synthesizing {
        results: ResultSet,
    },
    Done(ResearchAnswer),
}

impl Step {
    pub fn phase(&self) -> ResearchPhase {
        match self {
            Step::PlanningQueries => ResearchPhase::PlanningQueries,
            Step::Searching { .. } => ResearchPhase::Searching,
            Step::Reflecting { .. } => ResearchPhase::Reflecting,
            Step::AdditionalSearching { .. } => ResearchPhase::AdditionalSearching,
            Step::Synthesizing { .. } => ResearchPhase::Synthesizing,
            Step::Done(_) => ResearchPhase::Done,
        }
    }
}

/// Phase that follows `current`; `verdict` only matters after reflection.
///
/// Returns `None` for the terminal phase.
pub fn next_phase(current: ResearchPhase, verdict: &ReflectionVerdict) -> Option<ResearchPhase> {
    match current {
        ResearchPhase::PlanningQueries => Some(ResearchPhase::Searching),
        ResearchPhase::Searching => Some(ResearchPhase::Reflecting),
        ResearchPhase::Reflecting if verdict.should_search_again() => {
            Some(ResearchPhase::AdditionalSearching)
        }
        ResearchPhase::Reflecting | ResearchPhase::AdditionalSearching => {
            Some(ResearchPhase::Synthesizing)
        }
        ResearchPhase::Synthesizing => Some(ResearchPhase::Done),
        ResearchPhase::Done => None,
    }
}

/// Everything recorded about a run besides the answer.
#[derive(Debug, Default)]
struct RunTrace {
    queries: QuerySet,
    follow_up_queries: QuerySet,
    verdict: ReflectionVerdict,
    search_rounds: u32,
    total_results: usize,
    phases: Vec<ResearchPhase>,
    degradations: Vec<Degradation>,
}

impl RunTrace {
    fn record_round(&mut self, phase: ResearchPhase, round: &SearchRound) {
        self.search_rounds += 1;
        if round.has_failures() {
            self.degradations.push(Degradation::SearchFailures {
                phase,
                failed: round.failed_queries.len(),
                rate_limited: round.rate_limited,
                attempted: round.attempted,
            });
        }
    }
}

pub struct ResearchWorkflow {
    planner: QueryPlanner,
    searcher: SearchExecutor,
    reflector: ReflectionEngine,
    synthesizer: Synthesizer,
    config: ResearchConfig,
}

impl ResearchWorkflow {
    pub fn builder() -> ResearchWorkflowBuilder {
        ResearchWorkflowBuilder::default()
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Research `question` and return the cited answer.
    pub async fn run(&self, question: &str) -> Result<ResearchAnswer> {
        self.run_with(question, &RunOptions::default())
            .await
            .map(ResearchReport::into_answer)
    }

    /// Research `question` under `options`, returning the answer with its
    /// run trace.
    pub async fn run_with(&self, question: &str, options: &RunOptions) -> Result<ResearchReport> {
        let question = ResearchQuestion::new(question)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("research", %run_id);
        let cancel = options.cancel.child_token();
        let started_at = Utc::now();
        let start = Instant::now();

        let run = self.drive(&question, &cancel).instrument(span.clone());
        let outcome = match options.deadline.or(self.config.deadline) {
            Some(deadline) => match tokio::time::timeout(deadline, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    cancel.cancel();
                    Err(ResearchError::DeadlineExceeded(deadline))
                }
            },
            None => run.await,
        };

        let (trace, answer) = match outcome {
            Ok(done) => done,
            Err(e) => {
                span.in_scope(|| {
                    info!(
                        error = %e,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Research failed"
                    )
                });
                return Err(e);
            }
        };

        span.in_scope(|| {
            info!(
                rounds = trace.search_rounds,
                results = trace.total_results,
                citations = answer.citations.len(),
                degradations = trace.degradations.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Research complete"
            )
        });

        Ok(ResearchReport {
            run_id,
            question: question.as_str().to_string(),
            answer,
            queries: trace.queries,
            follow_up_queries: trace.follow_up_queries,
            need_more: trace.verdict.need_more,
            search_rounds: trace.search_rounds,
            total_results: trace.total_results,
            phases: trace.phases,
            degradations: trace.degradations,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn drive(
        &self,
        question: &ResearchQuestion,
        cancel: &CancellationToken,
    ) -> Result<(RunTrace, ResearchAnswer)> {
        info!(question = %question, "Research started");
        let mut trace = RunTrace::default();
        let mut step = Step::PlanningQueries;

        loop {
            let phase = step.phase();
            trace.phases.push(phase);
            info!(phase = %phase, "Entering phase");

            let handoff = match step {
                Step::Done(answer) => return Ok((trace, answer)),

                Step::PlanningQueries => {
                    let plan = self.planner.plan(question, cancel).await?;
                    if let Some(reason) = plan.fallback_reason {
                        trace.degradations.push(Degradation::PlannerFallback { reason });
                    }
                    trace.queries = plan.queries.clone();
                    Handoff::Queries(plan.queries)
                }

                Step::Searching { queries } => {
                    let round = self
                        .searcher
                        .execute(&queries, self.config.results_per_query, cancel)
                        .await?;
                    trace.record_round(phase, &round);
                    Handoff::Evidence {
                        executed: queries,
                        results: round.results,
                    }
                }

                Step::Reflecting { executed, results } => {
                    let reflection = self
                        .reflector
                        .reflect(question, &results, &executed, cancel)
                        .await?;
                    if let Some(reason) = reflection.fallback_reason {
                        trace
                            .degradations
                            .push(Degradation::ReflectionFallback { reason });
                    }
                    trace.verdict = reflection.verdict;
                    Handoff::Evidence { executed, results }
                }

                Step::AdditionalSearching {
                    follow_up,
                    mut results,
                } => {
                    let round = self
                        .searcher
                        .execute(&follow_up, self.config.follow_up_results_per_query, cancel)
                        .await?;
                    trace.record_round(phase, &round);
                    trace.follow_up_queries = follow_up.clone();
                    results.append(round.results);
                    Handoff::Evidence {
                        executed: follow_up,
                        results,
                    }
                }

                Step::Synthesizing { results } => {
                    trace.total_results = results.len();
                    if results.is_empty() {
                        trace.degradations.push(Degradation::NoResults);
                    }
                    let answer = self
                        .synthesizer
                        .synthesize(question, &results, cancel)
                        .await?;
                    Handoff::Answer(answer)
                }
            };

            step = successor(phase, handoff, &trace.verdict);
        }
    }
}

/// What a finished phase hands to the next one.
#[derive(Debug)]
enum Handoff {
    Queries(QuerySet),
    Evidence {
        executed: QuerySet,
        results: ResultSet,
    },
    Answer(ResearchAnswer),
}

/// Step entered after `previous` finished with `handoff`.
///
/// Branching after a search or reflection goes through [`next_phase`].
fn successor(previous: ResearchPhase, handoff: Handoff, verdict: &ReflectionVerdict) -> Step {
    match handoff {
        Handoff::Queries(queries) => Step::Searching { queries },
        Handoff::Answer(answer) => Step::Done(answer),
        Handoff::Evidence { executed, results } => match next_phase(previous, verdict) {
            Some(ResearchPhase::Reflecting) => Step::Reflecting { executed, results },
            Some(ResearchPhase::AdditionalSearching) => Step::AdditionalSearching {
                follow_up: verdict.follow_up_queries.clone(),
                results,
            },
            _ => Step::Synthesizing { results },
        },
    }
}

/// Builder for [`ResearchWorkflow`].
#[derive(Default)]
pub struct ResearchWorkflowBuilder {
    model: Option<Arc<dyn LanguageModel>>,
    search: Option<Arc<dyn SearchProvider>>,
    config: ResearchConfig,
}

impl ResearchWorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model used for planning, reflection and synthesis
    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn search_provider(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn config(mut self, config: ResearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails with [`ResearchError::Config`] when a collaborator is missing or
    /// a tunable is invalid.
    pub fn build(self) -> Result<ResearchWorkflow> {
        let model = self
            .model
            .ok_or_else(|| ResearchError::Config("no language model configured".to_string()))?;
        let search = self
            .search
            .ok_or_else(|| ResearchError::Config("no search provider configured".to_string()))?;
        self.config.validate()?;

        let config = self.config;
        info!(
            model = %model.model(),
            llm_provider = %model.name(),
            search_provider = %search.name(),
            language = config.language.name(),
            "Research workflow configured"
        );

        Ok(ResearchWorkflow {
            planner: QueryPlanner::new(model.clone(), config.retry, config.planner_temperature),
            searcher: SearchExecutor::new(search, config.retry, config.dispatch),
            reflector: ReflectionEngine::new(
                model.clone(),
                config.retry,
                config.reflection_temperature,
            ),
            synthesizer: Synthesizer::new(
                model,
                config.retry,
                config.synthesis_temperature,
                config.synthesis_max_tokens,
                config.language,
            ),
            config,
        })
    }
}
