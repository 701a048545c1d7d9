//! Check log: the sink every check step reports into.
//!
//! A `CheckLog` is passed explicitly to each validation call. It keeps the
//! sub-check outcomes for the final report and mirrors every entry as a
//! `tracing` event, so the caller decides where log lines go.

use crate::error::{CheckName, FailureKind, SubCheck};
use crate::mode::Mode;
use crate::report::CheckReport;

#[derive(Debug, Default)]
pub struct CheckLog {
    checks: Vec<SubCheck>,
}

impl CheckLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rule that held.
    pub fn pass(&mut self, check: CheckName, url: &str, detail: impl Into<String>) {
        self.record(SubCheck {
            check,
            passed: true,
            kind: None,
            url: url.to_owned(),
            detail: detail.into(),
        });
    }

    /// Record a rule that did not hold.
    pub fn fail(
        &mut self,
        check: CheckName,
        kind: FailureKind,
        url: &str,
        detail: impl Into<String>,
    ) {
        self.record(SubCheck {
            check,
            passed: false,
            kind: Some(kind),
            url: url.to_owned(),
            detail: detail.into(),
        });
    }

    fn record(&mut self, check: SubCheck) {
        let line = check.format_log_line();
        match check.kind {
            Some(FailureKind::Network) => tracing::error!(url = %check.url, "{line}"),
            _ => tracing::info!(url = %check.url, "{line}"),
        }
        self.checks.push(check);
    }

    #[must_use]
    pub fn checks(&self) -> &[SubCheck] {
        &self.checks
    }

    /// Whether any recorded rule failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| !c.passed)
    }

    /// Log the `[RESULT]` line and turn the log into a report.
    #[must_use]
    pub fn finish(self, url: &str, mode: Mode, ok: bool) -> CheckReport {
        if ok {
            tracing::info!("[RESULT] Success");
        } else {
            tracing::info!("[RESULT] Failure");
        }
        CheckReport {
            url: url.to_owned(),
            mode,
            ok,
            checks: self.checks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut log = CheckLog::new();
        log.pass(CheckName::Header, "http://a", "mpeg-dash-sand header found");
        log.fail(
            CheckName::Url,
            FailureKind::Network,
            "http://b",
            "The provided URL is not valid|http://b",
        );

        let checks = log.checks();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].check, CheckName::Header);
        assert!(checks[0].passed);
        assert_eq!(checks[1].kind, Some(FailureKind::Network));
        assert!(log.has_failures());
    }

    #[test]
    fn test_finish_builds_report() {
        let mut log = CheckLog::new();
        log.pass(CheckName::Message, "http://a", "XML message format valid");
        assert!(!log.has_failures());

        let report = log.finish("http://a", Mode::Body, true);
        assert!(report.ok);
        assert_eq!(report.mode, Mode::Body);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 0);
    }
}
