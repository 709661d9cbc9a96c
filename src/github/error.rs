//! GitHub API error categorization.
//!
//! Distinguishes transient failures (retriable: 5xx, rate limits, network
//! trouble) from permanent ones (most 4xx). The gateway uses the distinction
//! for logging and for the reporter's requeue decisions; the check-suite
//! adapter additionally cares about HTTP 422 ("suite already exists").

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Safe to retry with backoff: 5xx, 429, rate-limited 403, network
    /// timeouts.
    Transient,

    /// Requires intervention: most 4xx, auth failures, not-found.
    Permanent,
}

impl GitHubErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// A GitHub API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if one could be extracted.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates a permanent error without an octocrab source.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error for a raw HTTP response status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = if status >= 500 || status == 429 {
            GitHubErrorKind::Transient
        } else {
            GitHubErrorKind::Permanent
        };
        Self {
            kind,
            status_code: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an octocrab error by status code and message patterns.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = extract_status_code(&err);
        let message = err.to_string();

        let kind = match status_code {
            Some(429) => GitHubErrorKind::Transient,
            Some(403) if is_rate_limit_error(&message) => GitHubErrorKind::Transient,
            Some(code) if (500..600).contains(&code) => GitHubErrorKind::Transient,
            Some(_) => GitHubErrorKind::Permanent,
            None => {
                if is_network_error(&message) {
                    GitHubErrorKind::Transient
                } else {
                    GitHubErrorKind::Permanent
                }
            }
        };

        Self {
            kind,
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Returns true if this error is the Checks API's "check suite already
    /// exists for this SHA" response.
    pub fn is_unprocessable(&self) -> bool {
        self.status_code == Some(422)
    }
}

/// Extracts the HTTP status code from an octocrab error, if present.
///
/// octocrab's `Error` does not expose a stable status-code accessor across
/// all variants, so this falls back to message parsing. Returning `None`
/// degrades to conservative (permanent) categorization.
fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
    if let octocrab::Error::GitHub { source, .. } = err {
        return Some(source.status_code.as_u16());
    }

    let err_str = err.to_string();
    if let Some(idx) = err_str.find("status: ") {
        let rest = &err_str[idx + 8..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }

    for code in [401u16, 403, 404, 409, 422, 429, 500, 502, 503] {
        if err_str.contains(&code.to_string()) {
            return Some(code);
        }
    }

    None
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

/// Checks if an error message indicates a network-level error.
fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("timed out")
}
