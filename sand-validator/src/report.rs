//! Check report types.

use serde::Serialize;

use crate::error::SubCheck;
use crate::mode::Mode;

/// Result of one conformance check run.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct CheckReport {
    /// URL the check started from.
    pub url: String,
    pub mode: Mode,
    /// Whether every evaluated rule held.
    pub ok: bool,
    /// Every rule evaluated, in order.
    pub checks: Vec<SubCheck>,
}

impl CheckReport {
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.checks.len() - self.passed_count()
    }
}

/// The three response rules, reduced to one boolean by [`passed`](Self::passed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub content_type_ok: bool,
    /// `None` when the mode does not check the status code.
    pub status_ok: Option<bool>,
    pub xml_ok: bool,
}

impl ValidationOutcome {
    /// Every evaluated rule must hold.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.content_type_ok && self.status_ok.unwrap_or(true) && self.xml_ok
    }
}
