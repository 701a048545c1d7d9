//! Log subscriber setup and terminal colors.

use std::io::IsTerminal;

use colored::{Color, Colorize};
use tracing_subscriber::EnvFilter;

/// Filter directive for the given verbosity. `RUST_LOG` takes precedence.
#[must_use]
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "info,sand_validator=debug,sand_cli=debug",
        _ => "trace",
    }
}

/// Install the global `tracing` subscriber, writing to stderr.
///
/// Colors are disabled when the stream they go to is not a terminal.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
    // A subscriber may already be installed (tests); keep it.
    if let Err(e) = installed {
        tracing::debug!("keeping the existing log subscriber: {e}");
    }

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Color for an HTTP status: 2xx green, 3xx yellow, everything else red.
#[must_use]
pub fn status_color(status: u16) -> Color {
    if (200..300).contains(&status) {
        Color::Green
    } else if (300..400).contains(&status) {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// `<code> <reason>`, colored by status class.
#[must_use]
pub fn status_line(status: u16, reason: &str) -> String {
    format!("{status} {reason}")
        .trim_end()
        .color(status_color(status))
        .to_string()
}
