//! Shared output formatting for check reports.
//!
//! Provides JSON and plain-text formatters for `CheckReport`.
//! Color/terminal formatting belongs to the CLI layer.

use std::io::Write;

use crate::report::CheckReport;

/// Format a `CheckReport` as JSON to a writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(report: &CheckReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Format a `CheckReport` as human-readable plain text to a writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human(report: &CheckReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(80))?;
    writeln!(writer, "  SAND CONFORMANCE CHECK")?;
    writeln!(writer, "{}", "=".repeat(80))?;
    writeln!(writer)?;
    writeln!(writer, "  URL:            {}", report.url)?;
    writeln!(writer, "  Mode:           {}", report.mode)?;
    writeln!(writer, "  Checks passed:  {}", report.passed_count())?;
    writeln!(writer, "  Checks failed:  {}", report.failed_count())?;
    writeln!(writer)?;

    if !report.checks.is_empty() {
        writeln!(writer, "{}", "-".repeat(80))?;
        writeln!(writer, "  CHECKS")?;
        writeln!(writer, "{}", "-".repeat(80))?;
        for check in &report.checks {
            writeln!(writer, "{}", check.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "=".repeat(80))?;
    if report.ok {
        writeln!(writer, "\u{2713} SAND message conforms ({})", report.mode)?;
    } else {
        writeln!(
            writer,
            "\u{2717} {} check(s) failed ({})",
            report.failed_count(),
            report.mode
        )?;
        if report.checks.is_empty() {
            writeln!(writer, "    - No check was run")?;
        }
    }
    writeln!(writer, "{}", "=".repeat(80))?;

    Ok(())
}
