//! Citation URLs and markdown footnotes
//!
//! Footnote `[^n]` in an answer refers to entry `n - 1` of its
//! [`CitationList`]; numbering is 1-based and positional.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use url::Url;

use super::state::ResultSet;
use crate::config::MAX_CITATIONS;

static FOOTNOTE_MARKER: OnceLock<Regex> = OnceLock::new();
static FOOTNOTE_DEFINITION: OnceLock<Regex> = OnceLock::new();

fn footnote_marker() -> &'static Regex {
    FOOTNOTE_MARKER.get_or_init(|| Regex::new(r"\[\^(\d+)\]").expect("footnote marker pattern"))
}

fn footnote_definition() -> &'static Regex {
    FOOTNOTE_DEFINITION
        .get_or_init(|| Regex::new(r"^\s*\[\^[^\]]*\]:").expect("footnote definition pattern"))
}

/// Validate a result URL for use as a citation.
///
/// Returns the trimmed input unchanged when it parses as an absolute
/// `http`/`https` URL with a host and contains no whitespace or control
/// characters; `None` otherwise.
pub fn sanitize_url(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }

    let parsed = Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(trimmed.to_string()),
        _ => None,
    }
}

/// Sanitized, distinct citation URLs in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationList(Vec<String>);

impl CitationList {
    /// Collect up to [`MAX_CITATIONS`] valid URLs from `results`.
    pub fn from_results(results: &ResultSet) -> Self {
        let mut urls: Vec<String> = Vec::new();
        for url in results.iter().filter_map(|r| sanitize_url(&r.url)) {
            if urls.len() >= MAX_CITATIONS {
                break;
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Self(urls)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Footnote number citing `url`, if it is in the list.
    pub fn footnote_for(&self, url: &str) -> Option<usize> {
        let url = url.trim();
        self.0.iter().position(|u| u == url).map(|i| i + 1)
    }

    /// `[^n]: url` lines, one per citation.
    pub fn definitions(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, url)| format!("[^{}]: {}", i + 1, url))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Footnote numbers referenced inline in `text`, in order of appearance.
///
/// Definition lines are not counted as references.
pub fn footnote_references(text: &str) -> Vec<usize> {
    text.lines()
        .filter(|line| !footnote_definition().is_match(line))
        .flat_map(|line| {
            footnote_marker()
                .captures_iter(line)
                .filter_map(|caps| caps[1].parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Drop every footnote definition line and every inline marker outside
/// `1..=citation_count`.
///
/// Definitions are removed unconditionally so the caller can append the
/// canonical list.
pub fn strip_footnotes(text: &str, citation_count: usize) -> String {
    let marker = footnote_marker();
    text.lines()
        .filter(|line| !footnote_definition().is_match(line))
        .map(|line| {
            marker
                .replace_all(line, |caps: &Captures| {
                    match caps[1].parse::<usize>() {
                        Ok(n) if (1..=citation_count).contains(&n) => caps[0].to_string(),
                        _ => String::new(),
                    }
                })
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
