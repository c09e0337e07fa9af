//! # Pet Research Agent
//!
//! Answers pet-health questions with a deep search workflow: the question
//! is expanded into web queries, the results are checked for gaps (with at
//! most one follow-up round) and a cited markdown answer is written.
//!
//! ## Quick Start
//! ```bash
//! export GEMINI_API_KEY=... PERPLEXITY_API_KEY=...
//! cargo run -- "Why is my dog eating grass?"
//! ```

mod agent;
mod config;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pet_deep_research::{Degradation, ErrorKind, Language, ResearchError, ResearchReport, RunOptions};

use crate::agent::ResearchAgent;
use crate::config::{Config, LlmProvider, SearchBackend};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "pet-research-agent",
    version,
    about = "Researches pet-health questions on the web and writes a cited answer",
    long_about = r#"
Pet Research Agent - deep search for pet-health questions.

It will:
  1. Plan up to three web searches for your question
  2. Run them and check whether the evidence is enough
  3. Search once more if something is missing
  4. Write an answer with numbered sources

ENVIRONMENT:
  GEMINI_API_KEY          Gemini key (GEMINI_API_KEY_BACKUP, GEMINI_API_KEY_2 for rotation)
  PERPLEXITY_API_KEY      Perplexity search key
  TAVILY_API_KEY          Tavily search key (with SEARCH_PROVIDER=tavily)
  LLM_PROVIDER            gemini | ollama

EXAMPLES:
  pet-research-agent "Is it normal for my cat to sleep 16 hours a day?"
  pet-research-agent --language zh "狗狗为什么吃草？"
  pet-research-agent --json "Why does my rabbit thump?"
  pet-research-agent --agent "Hi! My puppy keeps hiccuping, should I worry?"
"#
)]
struct Args {
    /// The pet-health question to research
    #[arg(value_name = "QUESTION")]
    question: String,

    /// Answer language (en or zh)
    #[arg(short = 'l', long = "language", env = "ANSWER_LANGUAGE")]
    language: Option<Language>,

    /// Language model provider (gemini or ollama)
    #[arg(long = "llm", env = "LLM_PROVIDER")]
    llm: Option<LlmProvider>,

    /// Search provider (perplexity or tavily)
    #[arg(long = "search", env = "SEARCH_PROVIDER")]
    search: Option<SearchBackend>,

    /// Abort the run after this many seconds
    #[arg(long = "deadline-secs", value_name = "SECS")]
    deadline_secs: Option<u64>,

    /// Print the full research report as JSON
    #[arg(long = "json", default_value = "false", conflicts_with = "agent")]
    json: bool,

    /// Let an Ollama agent decide when to call the research workflow
    #[arg(long = "agent", default_value = "false")]
    agent: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(llm) = args.llm {
        config.llm_provider = llm;
    }
    if let Some(search) = args.search {
        config.search_backend = search;
    }
    if let Some(secs) = args.deadline_secs {
        config.deadline_secs = Some(secs);
    }
    config.validate()?;

    info!(
        llm = ?config.llm_provider,
        search = ?config.search_backend,
        language = config.language.name(),
        "Configuration loaded"
    );

    let agent = ResearchAgent::new(config)?;

    if args.agent {
        let response = agent.chat(&args.question).await?;
        println!("{}", response);
        return Ok(());
    }

    // Ctrl-C cancels the run
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let options = RunOptions::new().with_cancel(cancel);

    match agent.research(&args.question, &options).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Research failed");
            report_failure(&e);
            Err(e)
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================
fn print_report(report: &ResearchReport) {
    for degradation in &report.degradations {
        warn!(?degradation, "Run was degraded");
    }

    println!("\n{}", "=".repeat(60));
    println!("{}", report.question);
    println!("{}\n", "=".repeat(60));
    println!("{}", report.answer.answer_md);

    if !report.answer.citations.is_empty() {
        println!("\nSOURCES");
        for (i, url) in report.answer.citations.iter().enumerate() {
            println!("  {}. {}", i + 1, url);
        }
    }

    for note in degradation_notes(report) {
        eprintln!("\nNote: {}", note);
    }
    println!("\n{}", "=".repeat(60));
}

/// Caller-facing notes for a run that completed degraded.
fn degradation_notes(report: &ResearchReport) -> Vec<&'static str> {
    let mut notes = Vec::new();
    if report.search_rate_limited() {
        notes.push(ErrorKind::RateLimited.user_message());
    }
    if report
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::NoResults))
    {
        notes.push("no web sources were found; the answer is general guidance only.");
    }
    notes
}

fn report_failure(e: &anyhow::Error) {
    match e.downcast_ref::<ResearchError>() {
        Some(research) => {
            eprintln!("\nResearch failed: {}", research.user_message());
            match research.kind() {
                ErrorKind::Config => eprintln!("Check your API keys and provider settings."),
                ErrorKind::RateLimited => {
                    eprintln!("Tip: add GEMINI_API_KEY_BACKUP to rotate keys when rate limited.")
                }
                _ => {}
            }
        }
        None => eprintln!("\nResearch failed: {}", e),
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `RUST_LOG` wins when set; otherwise `--verbose` picks DEBUG over INFO.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "Why is my dog eating grass?"]);
        assert_eq!(args.question, "Why is my dog eating grass?");
        assert!(!args.json);
        assert!(!args.agent);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from([
            "test",
            "--json",
            "--verbose",
            "--language",
            "zh",
            "--search",
            "tavily",
            "--deadline-secs",
            "45",
            "猫咪打喷嚏",
        ]);

        assert_eq!(args.question, "猫咪打喷嚏");
        assert!(args.json);
        assert!(args.verbose);
        assert_eq!(args.language, Some(Language::Chinese));
        assert_eq!(args.search, Some(SearchBackend::Tavily));
        assert_eq!(args.deadline_secs, Some(45));
    }

    fn report_with(degradations: serde_json::Value) -> ResearchReport {
        serde_json::from_value(serde_json::json!({
            "run_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "question": "Why is my dog eating grass?",
            "answer": {"answer_md": "Mostly harmless.", "citations": []},
            "queries": ["Why is my dog eating grass?"],
            "follow_up_queries": [],
            "need_more": false,
            "search_rounds": 1,
            "total_results": 0,
            "phases": ["planning_queries", "searching", "reflecting", "synthesizing", "done"],
            "degradations": degradations,
            "started_at": "2026-01-05T10:00:00Z",
            "finished_at": "2026-01-05T10:00:09Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_rate_limited_search_gets_wait_note() {
        let report = report_with(serde_json::json!([
            {"kind": "search_failures", "phase": "searching", "failed": 3, "rate_limited": 3, "attempted": 3},
            {"kind": "no_results"}
        ]));
        let notes = degradation_notes(&report);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], ErrorKind::RateLimited.user_message());
    }

    #[test]
    fn test_plain_search_failure_has_no_wait_note() {
        let report = report_with(serde_json::json!([
            {"kind": "search_failures", "phase": "searching", "failed": 1, "rate_limited": 0, "attempted": 3}
        ]));
        assert!(degradation_notes(&report).is_empty());
    }

    #[test]
    fn test_json_conflicts_with_agent() {
        assert!(Args::try_parse_from(["test", "--json", "--agent", "q"]).is_err());
    }

    #[test]
    fn test_bad_provider_rejected() {
        assert!(Args::try_parse_from(["test", "--llm", "openai", "q"]).is_err());
    }
}
