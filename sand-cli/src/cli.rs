//! `sand-client` command line.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use sand_validator::output::{write_human, write_json};
use sand_validator::{CheckConfig, CheckLog, Checker, Mode, StatusPattern};

#[derive(Debug, Parser)]
#[command(
    name = "sand-client",
    version,
    about = "ISO/IEC 23009-5 SAND conformance client",
    long_about = "Requests a DANE URL and validates the SAND message it serves: \
                  the content type, the HTTP status code and the XML envelope. \
                  Logs every test on stderr and prints a report on stdout."
)]
pub struct Cli {
    /// DANE URL to request, e.g. <http://mydane.com/sand>
    pub url: String,

    /// Where the SAND message is found, or which PER protocol carries it
    #[arg(value_enum)]
    pub mode: ModeArg,

    /// Regex the HTTP status code must fully match, replacing the mode's
    #[arg(long, value_name = "REGEX")]
    pub expect_status: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// URL of the message in the `mpeg-dash-sand` response header
    Header,
    /// Message in the response body
    Body,
    /// PER assistance: body message, status 200
    Assistance,
    /// PER enforcement: body message, status 300
    Enforcement,
    /// PER error: body message, status 4xx
    Error,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Header => Self::Header,
            ModeArg::Body => Self::Body,
            ModeArg::Assistance => Self::Assistance,
            ModeArg::Enforcement => Self::Enforcement,
            ModeArg::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

impl Cli {
    /// Check options from the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if `--expect-status` is not a valid regex.
    pub fn check_config(&self) -> Result<CheckConfig> {
        self.apply(CheckConfig::default())
    }

    /// Overwrite the fields of `config` the flags control.
    ///
    /// # Errors
    ///
    /// Returns an error if `--expect-status` is not a valid regex.
    pub fn apply(&self, mut config: CheckConfig) -> Result<CheckConfig> {
        config.client.timeout = Duration::from_secs(self.timeout);
        if let Some(pattern) = &self.expect_status {
            config.status_override = Some(StatusPattern::new(pattern)?);
        }
        Ok(config)
    }
}

/// Run the check and print the report to stdout.
///
/// Returns whether the DANE passed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the report cannot
/// be written. Failed checks are not errors.
pub async fn run(cli: &Cli) -> Result<bool> {
    let mut out = std::io::stdout();
    run_with_writer(cli, CheckConfig::default(), &mut out).await
}

/// Like [`run`], writing the report to `writer`. Flags overwrite the matching
/// fields of `base`.
///
/// # Errors
///
/// See [`run`].
pub async fn run_with_writer(cli: &Cli, base: CheckConfig, writer: &mut dyn Write) -> Result<bool> {
    let config = cli.apply(base)?;
    let mode = Mode::from(cli.mode);
    let checker = Checker::new(config)?;

    tracing::debug!(url = %cli.url, %mode, "starting SAND conformance check");
    let mut log = CheckLog::new();
    let ok = checker.run(&cli.url, mode, &mut log).await;
    let report = log.finish(&cli.url, mode, ok);

    match cli.format {
        OutputFormat::Human => write_human(&report, writer)?,
        OutputFormat::Json => write_json(&report, writer)?,
    }
    Ok(report.ok)
}
