//! Header injection: send SAND messages as HTTP request headers.
//!
//! A diagnostic companion to the conformance client. Each header is sent in
//! its own GET request and the raw status line and body are printed for
//! manual inspection; nothing is validated.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sand_validator::{ClientConfig, FetchResult, HttpFetcher, parse_http_url};
use url::Url;

use crate::logging::status_line;

#[derive(Debug, Parser)]
#[command(
    name = "sand-header",
    version,
    about = "Send SAND messages as HTTP headers and print the raw responses",
    after_help = "Examples:\n  \
                  sand-header localhost:5000/headers SAND-MaxRTT \"maxRTT=200\"\n  \
                  sand-header http://localhost:5000/headers headers.txt\n\n\
                  A header file holds one `Name: value` header per line."
)]
pub struct HeaderArgs {
    /// Target URL; the http:// scheme may be omitted (<server>[:<port>]/<path>)
    pub url: String,

    /// Header name, or a file of headers when no value is given
    pub name_or_file: String,

    /// Header value
    pub value: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// A validated header name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPair {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl HeaderPair {
    /// Validate a header name and value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid HTTP token or the value
    /// contains control characters.
    pub fn new(name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name '{}'", name.trim()))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid value for header '{name}'"))?;
        Ok(Self { name, value })
    }
}

/// Parse the target, defaulting to `http://` when no scheme is given.
///
/// # Errors
///
/// Returns an error if the result is not a valid http(s) URL.
pub fn parse_target(target: &str) -> Result<Url> {
    let target = target.trim();
    let url = if target.contains("://") {
        target.to_owned()
    } else {
        format!("http://{target}")
    };
    Ok(parse_http_url(&url)?)
}

/// Parse a header file: one `Name: value` pair per line, blank lines ignored.
///
/// # Errors
///
/// Returns an error naming the first line that is not a valid header.
pub fn parse_header_file(content: &str) -> Result<Vec<HeaderPair>> {
    let mut pairs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            bail!("line {}: expected 'Name: value', got '{}'", index + 1, line.trim());
        };
        let pair = HeaderPair::new(name, value).with_context(|| format!("line {}", index + 1))?;
        pairs.push(pair);
    }
    Ok(pairs)
}

/// Read and parse a header file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_header_file(path: &Path) -> Result<Vec<HeaderPair>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read header file {}", path.display()))?;
    parse_header_file(&content).with_context(|| format!("In header file {}", path.display()))
}

impl HeaderArgs {
    /// The headers to send: the single pair, or the contents of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair is invalid or the file cannot be used.
    pub fn headers(&self) -> Result<Vec<HeaderPair>> {
        match &self.value {
            Some(value) => Ok(vec![HeaderPair::new(&self.name_or_file, value)?]),
            None => read_header_file(Path::new(&self.name_or_file)),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.timeout = Duration::from_secs(self.timeout);
        // Redirect responses are shown as they are.
        config.max_redirects = 0;
        config
    }
}

/// Send one GET to `url` carrying `pair`.
///
/// # Errors
///
/// Returns an error if the request fails at the network level.
pub async fn send(fetcher: &HttpFetcher, url: &Url, pair: &HeaderPair) -> Result<FetchResult> {
    let mut headers = HeaderMap::new();
    headers.insert(pair.name.clone(), pair.value.clone());
    tracing::debug!(%url, header = %pair.name, "sending header");
    Ok(fetcher.fetch_url(url, headers).await?)
}

/// Print the status line and body of a response.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_response(response: &FetchResult, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "{}", status_line(response.status, &response.reason))?;
    writeln!(writer, "{}", String::from_utf8_lossy(&response.body))?;
    Ok(())
}

/// Send every header and print each response.
///
/// Headers are validated before the first request is sent.
///
/// # Errors
///
/// Returns an error on invalid input or the first failed request.
pub async fn run(args: &HeaderArgs, writer: &mut dyn Write) -> Result<()> {
    run_with_config(args, &args.client_config(), writer).await
}

/// Like [`run`], with explicit client options.
///
/// # Errors
///
/// See [`run`].
pub async fn run_with_config(
    args: &HeaderArgs,
    config: &ClientConfig,
    writer: &mut dyn Write,
) -> Result<()> {
    let url = parse_target(&args.url)?;
    let pairs = args.headers()?;
    if pairs.is_empty() {
        bail!("No headers to send");
    }

    let fetcher = HttpFetcher::new(config)?;
    for pair in &pairs {
        let response = send(&fetcher, &url, pair).await?;
        write_response(&response, writer)?;
    }
    Ok(())
}
