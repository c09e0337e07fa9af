//! Research workflow
//!
//! # Overview
//!
//! ```text
//! question ─▶ QueryPlanner ─▶ SearchExecutor ─▶ ReflectionEngine ─┬─▶ Synthesizer ─▶ answer
//!                                                                  └─▶ SearchExecutor (once)
//! ```
//!
//! # Module Structure
//!
//! - `state` - run data model (questions, query sets, results, report)
//! - `citations` - URL sanitation, citation list, footnote handling
//! - `prompts` - prompt templates and evidence rendering
//! - `planner` - question to queries
//! - `reflection` - is the evidence enough
//! - `synthesizer` - cited markdown answer
//! - `workflow` - state machine wiring the above

pub mod citations;
pub mod planner;
pub mod prompts;
pub mod reflection;
pub mod state;
pub mod synthesizer;
pub mod workflow;

// Re-exports for convenience
pub use citations::{sanitize_url, CitationList};
pub use planner::{QueryPlan, QueryPlanner};
pub use prompts::ResearchPrompts;
pub use reflection::{Reflection, ReflectionEngine};
pub use state::{
    Degradation, QuerySet, ReflectionVerdict, ResearchAnswer, ResearchPhase, ResearchQuestion,
    ResearchReport, ResultSet, SearchResult,
};
pub use synthesizer::{finalize_answer, Synthesizer};
pub use workflow::{next_phase, ResearchWorkflow, ResearchWorkflowBuilder, RunOptions, Step};
