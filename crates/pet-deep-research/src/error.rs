//! Error types for the research workflow
//!
//! Every failure carries enough structure for a caller to pick its message:
//! a rate-limited provider ("please wait") is distinguishable from a generic
//! failure, and both from a cancelled run.

use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`ResearchError`] for caller-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing credentials or invalid tunables, detected before any network call
    Config,
    /// The question itself is unusable (blank)
    InvalidQuestion,
    /// A provider answered 429 and retries were exhausted
    RateLimited,
    /// Any other provider failure (network, HTTP status, upstream SDK)
    Provider,
    /// A provider answered, but not with something we could use
    MalformedOutput,
    /// The caller cancelled the run or its deadline passed
    Cancelled,
}

/// Top-level error for a research run.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Research question must not be empty")]
    InvalidQuestion,

    #[error("{provider} rate limited - too many requests")]
    RateLimited { provider: String },

    #[error("{provider} request timed out")]
    Timeout { provider: String },

    #[error("{provider} connection failed: {message}")]
    Connection { provider: String, message: String },

    #[error("{provider} unauthorized - check API key")]
    Unauthorized { provider: String },

    #[error("{provider} bad request: {body}")]
    BadRequest { provider: String, body: String },

    #[error("{provider} server error ({status}): {body}")]
    ServerError {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} HTTP error ({status}): {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {message}")]
    Upstream { provider: String, message: String },

    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Research cancelled")]
    Cancelled,

    #[error("Research deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl ErrorKind {
    /// Caller-facing text for failures of this kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => {
                "The research service is receiving too many requests. Please wait a moment and try again."
            }
            ErrorKind::Cancelled => "The research request was cancelled before it finished.",
            ErrorKind::Config => "The research service is not configured correctly.",
            ErrorKind::InvalidQuestion => "Please enter a question to research.",
            ErrorKind::Provider | ErrorKind::MalformedOutput => {
                "Deep search is temporarily unavailable. Please try again later."
            }
        }
    }
}

impl ResearchError {
    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidQuestion => ErrorKind::InvalidQuestion,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Timeout { .. }
            | Self::Connection { .. }
            | Self::Unauthorized { .. }
            | Self::BadRequest { .. }
            | Self::ServerError { .. }
            | Self::Http { .. }
            | Self::Upstream { .. } => ErrorKind::Provider,
            Self::MalformedResponse { .. } | Self::Synthesis(_) => ErrorKind::MalformedOutput,
            Self::Cancelled | Self::DeadlineExceeded(_) => ErrorKind::Cancelled,
        }
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Connection { .. }
                | Self::ServerError { .. }
                | Self::Upstream { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ErrorKind::RateLimited
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Map a non-success HTTP status from `provider`.
    pub(crate) fn from_status(provider: &str, status: u16, body: String) -> Self {
        let provider = provider.to_string();
        match status {
            400 => Self::BadRequest { provider, body },
            401 | 403 => Self::Unauthorized { provider },
            429 => Self::RateLimited { provider },
            500..=599 => Self::ServerError {
                provider,
                status,
                body,
            },
            _ => Self::Http {
                provider,
                status,
                body,
            },
        }
    }

    /// Map a transport-level reqwest failure from `provider`.
    pub(crate) fn from_transport(provider: &str, e: reqwest::Error) -> Self {
        let provider = provider.to_string();
        if e.is_timeout() {
            Self::Timeout { provider }
        } else if e.is_connect() {
            Self::Connection {
                provider,
                message: e.to_string(),
            }
        } else {
            Self::Upstream {
                provider,
                message: e.to_string(),
            }
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

pub type Result<T, E = ResearchError> = std::result::Result<T, E>;
