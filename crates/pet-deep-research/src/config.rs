//! Research workflow tunables

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ResearchError;
use crate::retry::RetryPolicy;

/// Maximum queries in a planned query set (question included)
pub const MAX_QUERIES: usize = 3;

/// Maximum follow-up queries reflection may add
pub const MAX_FOLLOW_UP_QUERIES: usize = 2;

/// Maximum citations in a final answer
pub const MAX_CITATIONS: usize = 10;

/// Maximum results rendered into a reflection or synthesis prompt
pub const MAX_PROMPT_RESULTS: usize = 24;

/// Maximum characters of a snippet rendered into a prompt
pub const MAX_SNIPPET_CHARS: usize = 512;

/// Language the final answer is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Chinese,
}

impl Language {
    /// Headings of the sections every answer must contain, in order.
    pub fn required_sections(&self) -> [&'static str; 4] {
        match self {
            Language::English => [
                "Possible Causes",
                "Home Care",
                "When to See a Vet",
                "Reminder",
            ],
            Language::Chinese => ["可能原因", "家庭照护", "何时就医", "温馨提示"],
        }
    }

    /// Disclaimer appended to every answer.
    pub fn disclaimer(&self) -> &'static str {
        match self {
            Language::English => {
                "**Important:** This advice is compiled from web sources for reference only and is not a veterinary diagnosis. If symptoms persist or worsen, please consult a licensed veterinarian promptly."
            }
            Language::Chinese => {
                "**重要提示**：本建议基于网络资料整理，仅供参考，不能替代专业兽医诊断。如症状持续或加重，请及时咨询专业兽医。"
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Chinese => "Chinese (Simplified)",
        }
    }
}

impl FromStr for Language {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "zh" | "zh-cn" | "chinese" => Ok(Language::Chinese),
            other => Err(ResearchError::Config(format!(
                "unsupported answer language: {}",
                other
            ))),
        }
    }
}

/// How the search executor dispatches the queries of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchDispatch {
    /// All queries in flight at once; results merged in submission order
    #[default]
    Concurrent,
    /// One query at a time with a fixed pause between requests
    Sequential { spacing: Duration },
}

/// Configuration for a research workflow.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Retry budget applied to every model and search call
    pub retry: RetryPolicy,

    /// Results requested per query in the first search round
    pub results_per_query: u32,

    /// Results requested per query in the follow-up round
    pub follow_up_results_per_query: u32,

    pub dispatch: SearchDispatch,

    /// Language of the final answer
    pub language: Language,

    pub planner_temperature: f64,
    pub reflection_temperature: f64,
    pub synthesis_temperature: f64,

    /// Output token cap for the synthesis call
    pub synthesis_max_tokens: u32,

    /// Wall-clock limit for a whole run
    pub deadline: Option<Duration>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            results_per_query: 10,
            follow_up_results_per_query: 8,
            dispatch: SearchDispatch::Concurrent,
            language: Language::English,
            planner_temperature: 0.3,
            reflection_temperature: 0.3,
            synthesis_temperature: 0.4,
            synthesis_max_tokens: 8000,
            deadline: None,
        }
    }
}

impl ResearchConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_dispatch(mut self, dispatch: SearchDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.results_per_query == 0 || self.follow_up_results_per_query == 0 {
            return Err(ResearchError::Config(
                "results per query must be at least 1".to_string(),
            ));
        }

        for (name, temp) in [
            ("planner", self.planner_temperature),
            ("reflection", self.reflection_temperature),
            ("synthesis", self.synthesis_temperature),
        ] {
            if !(0.0..=2.0).contains(&temp) {
                return Err(ResearchError::Config(format!(
                    "{} temperature must be between 0.0 and 2.0, got: {}",
                    name, temp
                )));
            }
        }

        if self.synthesis_max_tokens == 0 {
            return Err(ResearchError::Config(
                "synthesis max tokens must be at least 1".to_string(),
            ));
        }

        if self.deadline == Some(Duration::ZERO) {
            return Err(ResearchError::Config("deadline must be positive".to_string()));
        }

        Ok(())
    }
}
