//! Check modes and status code patterns.

use std::fmt;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Which fetch + validate sequence to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The SAND message URL is announced in the `mpeg-dash-sand` header.
    Header,
    /// The SAND message is the response body.
    Body,
    /// PER message delivered with `200`.
    Assistance,
    /// PER message delivered with `300`.
    Enforcement,
    /// PER message delivered with a `4xx` status.
    Error,
}

impl Mode {
    pub const ALL: [Self; 5] = [
        Self::Header,
        Self::Body,
        Self::Assistance,
        Self::Enforcement,
        Self::Error,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Body => "body",
            Self::Assistance => "assistance",
            Self::Enforcement => "enforcement",
            Self::Error => "error",
        }
    }

    /// Status pattern the PER protocol modes expect. Message-location modes
    /// do not check the status code.
    #[must_use]
    pub fn status_pattern(self) -> Option<&'static str> {
        match self {
            Self::Header | Self::Body => None,
            Self::Assistance => Some("200"),
            Self::Enforcement => Some("300"),
            Self::Error => Some("4[0-9]{2}"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a status pattern that is not a valid regex.
#[derive(Debug, Error)]
#[error("Invalid status pattern '{pattern}': {source}")]
pub struct StatusPatternError {
    pub pattern: String,
    pub source: regex::Error,
}

/// A regex over the decimal HTTP status code.
///
/// The pattern must match the whole status code: `4[0-9]{2}` matches `404`
/// but `40` does not match `404`.
#[derive(Debug, Clone)]
pub struct StatusPattern {
    pattern: String,
    regex: Regex,
}

impl StatusPattern {
    /// Compile a status pattern.
    ///
    /// # Errors
    ///
    /// Returns [`StatusPatternError`] if `pattern` is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self, StatusPatternError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            StatusPatternError {
                pattern: pattern.to_owned(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_owned(),
            regex,
        })
    }

    #[must_use]
    pub fn matches(&self, status: u16) -> bool {
        self.regex.is_match(&status.to_string())
    }
}

impl fmt::Display for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
