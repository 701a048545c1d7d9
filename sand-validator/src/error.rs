//! Error and sub-check types for SAND conformance checks.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Network-level failure while fetching a URL.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The URL could not be parsed.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The URL is not `http` or `https`.
    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String, source: reqwest::Error },

    /// Connection refused, DNS failure, TLS failure, too many redirects, etc.
    #[error("Could not retrieve {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    /// The response body could not be read.
    #[error("Failed to read the response body from {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    /// The HTTP client could not be constructed.
    #[error("Failed to build the HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Why a sub-check failed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FailureKind {
    /// Connection, DNS, timeout or URL failure.
    Network,
    /// The `mpeg-dash-sand` header is absent.
    MissingHeader,
    /// Wrong content type or unexpected status code.
    MalformedResponse,
    /// The body is not a valid SAND message, or the validator gave up.
    InvalidXml,
}

/// The individual rules a check is made of.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    Fetch,
    Header,
    Url,
    ContentType,
    StatusCode,
    Message,
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Header => "header",
            Self::Url => "URL",
            Self::ContentType => "content-type header",
            Self::StatusCode => "HTTP response code",
            Self::Message => "message",
        })
    }
}

/// Outcome of one sub-check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub struct SubCheck {
    /// Which rule was evaluated.
    pub check: CheckName,
    /// Whether the rule held.
    pub passed: bool,
    /// Failure classification; `None` when `passed`.
    pub kind: Option<FailureKind>,
    /// The URL whose response was inspected.
    pub url: String,
    /// `|`-separated details, e.g. `expected=application/sand+xml|used=text/xml`.
    pub detail: String,
}

impl SubCheck {
    /// Format the sub-check as the `[TEST]` log line.
    #[must_use]
    pub fn format_log_line(&self) -> String {
        let verdict = if self.passed { "OK" } else { "KO" };
        format!("[TEST] {}|{verdict}|{}", self.check, self.detail)
    }

    /// Format the sub-check for human-readable output.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        let verdict = if self.passed { "OK" } else { "KO" };
        format!("[{verdict}] {}: {} ({})", self.check, self.detail, self.url)
    }
}
