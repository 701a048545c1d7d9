//! # sand-validator
//!
//! Conformance checks for ISO/IEC 23009-5 SAND messages served by a DANE.
//!
//! A check fetches a URL, locates the SAND message (in the response body, or
//! behind the URL announced by the `mpeg-dash-sand` header) and validates
//! the content type, the status code and the XML envelope. Every rule that
//! is evaluated must hold for the check to pass.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sand_validator::{CheckConfig, CheckLog, Checker, Mode};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let checker = Checker::new(CheckConfig::default())?;
//! let mut log = CheckLog::new();
//! let ok = checker.run("http://dane.example/sand", Mode::Header, &mut log).await;
//! let report = log.finish("http://dane.example/sand", Mode::Header, ok);
//! println!("Checks failed: {}", report.failed_count());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fetch;
mod log;
mod message;
mod mode;
pub mod output;
mod report;

pub use config::{CheckConfig, ClientConfig};
pub use error::{CheckName, FailureKind, FetchError, SubCheck};
pub use fetch::{FetchResult, HttpFetcher, parse_http_url};
pub use log::CheckLog;
pub use message::{EnvelopeValidator, MessageValidator, XmlVerdict};
pub use mode::{Mode, StatusPattern, StatusPatternError};
pub use report::{CheckReport, ValidationOutcome};
pub use sand_message::{SAND_CONTENT_TYPE, SAND_HEADER};

use reqwest::header::HeaderMap;
use url::Url;

/// Runs SAND conformance checks.
pub struct Checker {
    fetcher: HttpFetcher,
    validator: Box<dyn MessageValidator>,
    config: CheckConfig,
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("fetcher", &self.fetcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Checker {
    /// Build a checker with the built-in envelope validator.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(config: CheckConfig) -> Result<Self, FetchError> {
        let fetcher =
            HttpFetcher::new(&config.client)?.with_body_limit(config.max_message_bytes);
        let validator = Box::new(EnvelopeValidator::new(config.limits()));
        Ok(Self {
            fetcher,
            validator,
            config,
        })
    }

    /// Replace the message validator.
    #[must_use]
    pub fn with_validator(mut self, validator: impl MessageValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Run the check sequence selected by `mode`.
    ///
    /// A status override in the config replaces the mode's status pattern,
    /// and adds a status rule to the `body` mode.
    pub async fn run(&self, url: &str, mode: Mode, log: &mut CheckLog) -> bool {
        if let Some(pattern) = &self.config.status_override
            && mode != Mode::Header
        {
            return self.validate_response(url, pattern, log).await;
        }

        match mode {
            Mode::Header => self.validate_via_header(url, log).await,
            Mode::Body => self.validate_via_body(url, log).await,
            Mode::Assistance | Mode::Enforcement | Mode::Error => {
                let Some(pattern) = mode.status_pattern() else {
                    return false;
                };
                match StatusPattern::new(pattern) {
                    Ok(pattern) => self.validate_response(url, &pattern, log).await,
                    Err(e) => {
                        tracing::error!("{e}");
                        false
                    }
                }
            }
        }
    }

    /// Locate the SAND message through the `mpeg-dash-sand` header of `url`
    /// and validate it.
    pub async fn validate_via_header(&self, url: &str, log: &mut CheckLog) -> bool {
        let Some(response) = self.fetch_logged(url, log).await else {
            return false;
        };

        let Some(value) = response.header(SAND_HEADER) else {
            log.fail(
                CheckName::Header,
                FailureKind::MissingHeader,
                url,
                format!("No {SAND_HEADER} header found in the response"),
            );
            return false;
        };
        log.pass(
            CheckName::Header,
            url,
            format!("{SAND_HEADER} header found in the response"),
        );

        if value.trim().is_empty() {
            log.fail(
                CheckName::Url,
                FailureKind::MalformedResponse,
                url,
                format!("The provided URL is not valid|{SAND_HEADER} header is empty"),
            );
            return false;
        }

        let sand_url = match resolve_header_url(&response.url, value) {
            Ok(sand_url) => sand_url,
            Err(e) => {
                log.fail(
                    CheckName::Url,
                    FailureKind::MalformedResponse,
                    url,
                    format!("The provided URL is not valid|{value}|{e}"),
                );
                return false;
            }
        };

        if let Err(e) = self.fetcher.fetch_url(&sand_url, HeaderMap::new()).await {
            log.fail(
                CheckName::Url,
                FailureKind::Network,
                sand_url.as_str(),
                format!("The provided URL is not valid|{sand_url}|{e}"),
            );
            return false;
        }
        log.pass(
            CheckName::Url,
            sand_url.as_str(),
            format!("The provided URL is valid|{sand_url}"),
        );

        self.validate_via_body(sand_url.as_str(), log).await
    }

    /// Validate the body of `url` as a SAND message: content type and XML.
    pub async fn validate_via_body(&self, url: &str, log: &mut CheckLog) -> bool {
        match self.fetch_logged(url, log).await {
            Some(response) => self.inspect(&response, None, log).passed(),
            None => false,
        }
    }

    /// Validate content type, status code and XML of the response to `url`.
    pub async fn validate_response(
        &self,
        url: &str,
        status: &StatusPattern,
        log: &mut CheckLog,
    ) -> bool {
        match self.fetch_logged(url, log).await {
            Some(response) => self.inspect(&response, Some(status), log).passed(),
            None => false,
        }
    }

    /// Apply the response rules to an already fetched response. The status
    /// rule is skipped when `status` is `None`.
    pub fn inspect(
        &self,
        response: &FetchResult,
        status: Option<&StatusPattern>,
        log: &mut CheckLog,
    ) -> ValidationOutcome {
        let url = response.url.as_str();
        let expected = self.config.expected_content_type.to_ascii_lowercase();

        let content_type_ok = match response.media_type() {
            Some(used) if used == expected => {
                log.pass(
                    CheckName::ContentType,
                    url,
                    format!("Valid content type|{expected}"),
                );
                true
            }
            used => {
                log.fail(
                    CheckName::ContentType,
                    FailureKind::MalformedResponse,
                    url,
                    format!(
                        "Wrong content type|expected={expected}|used={}",
                        used.as_deref().unwrap_or("<none>")
                    ),
                );
                false
            }
        };

        let status_ok = status.map(|pattern| {
            if pattern.matches(response.status) {
                log.pass(
                    CheckName::StatusCode,
                    url,
                    format!("value={}", response.status),
                );
                true
            } else {
                log.fail(
                    CheckName::StatusCode,
                    FailureKind::MalformedResponse,
                    url,
                    format!("value={}|regex={pattern}", response.status),
                );
                false
            }
        });

        let xml_ok = match self.validator.validate(&response.body) {
            XmlVerdict::Valid(envelope) => {
                let detail = envelope.as_ref().map_or_else(
                    || "XML message format valid".to_owned(),
                    |env| format!("XML message format valid|{}", message::describe(env)),
                );
                log.pass(CheckName::Message, url, detail);
                true
            }
            XmlVerdict::Invalid(reason) => {
                log.fail(
                    CheckName::Message,
                    FailureKind::InvalidXml,
                    url,
                    format!("XML message format invalid|{reason}"),
                );
                false
            }
            XmlVerdict::ValidatorError(reason) => {
                log.fail(
                    CheckName::Message,
                    FailureKind::InvalidXml,
                    url,
                    format!("XML message could not be validated|{reason}"),
                );
                false
            }
        };

        ValidationOutcome {
            content_type_ok,
            status_ok,
            xml_ok,
        }
    }

    async fn fetch_logged(&self, url: &str, log: &mut CheckLog) -> Option<FetchResult> {
        match self.fetcher.fetch(url).await {
            Ok(response) => Some(response),
            Err(e) => {
                log.fail(
                    CheckName::Fetch,
                    FailureKind::Network,
                    url,
                    format!("Could not retrieve the message|{e}"),
                );
                None
            }
        }
    }
}

/// Resolve the `mpeg-dash-sand` header value against the URL it came from.
fn resolve_header_url(base: &Url, value: &str) -> Result<Url, FetchError> {
    let joined = base
        .join(value.trim())
        .map_err(|source| FetchError::InvalidUrl {
            url: value.to_owned(),
            source,
        })?;
    parse_http_url(joined.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sand_message::SAND_NAMESPACE;

    fn checker() -> Checker {
        Checker::new(CheckConfig::default()).unwrap()
    }

    fn response(status: u16, content_type: Option<&str>, body: &str) -> FetchResult {
        let mut headers = BTreeMap::new();
        if let Some(ct) = content_type {
            headers.insert("content-type".to_owned(), ct.to_owned());
        }
        FetchResult {
            url: Url::parse("http://dane.example/sand").unwrap(),
            status,
            reason: String::new(),
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    fn valid_body() -> String {
        format!(r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="dane"/>"#)
    }

    fn pattern(p: &str) -> StatusPattern {
        StatusPattern::new(p).unwrap()
    }

    #[test]
    fn test_inspect_all_rules_hold() {
        let mut log = CheckLog::new();
        let outcome = checker().inspect(
            &response(200, Some(SAND_CONTENT_TYPE), &valid_body()),
            Some(&pattern("200")),
            &mut log,
        );
        assert!(outcome.passed());
        assert_eq!(log.checks().len(), 3);
        assert!(!log.has_failures());
    }

    #[test]
    fn test_inspect_not_xml_fails_regardless() {
        let mut log = CheckLog::new();
        let outcome = checker().inspect(
            &response(200, Some(SAND_CONTENT_TYPE), "<not-closed>"),
            Some(&pattern("200")),
            &mut log,
        );
        assert!(outcome.content_type_ok);
        assert_eq!(outcome.status_ok, Some(true));
        assert!(!outcome.xml_ok);
        assert!(!outcome.passed());
        assert_eq!(log.checks()[2].kind, Some(FailureKind::InvalidXml));
    }

    #[test]
    fn test_inspect_wrong_content_type() {
        let mut log = CheckLog::new();
        let outcome = checker().inspect(
            &response(200, Some("text/xml"), &valid_body()),
            None,
            &mut log,
        );
        assert!(!outcome.passed());
        assert!(outcome.xml_ok);
        assert_eq!(outcome.status_ok, None);
        assert!(log.checks()[0].detail.contains("used=text/xml"));
    }

    #[test]
    fn test_inspect_missing_content_type() {
        let mut log = CheckLog::new();
        let outcome = checker().inspect(&response(200, None, &valid_body()), None, &mut log);
        assert!(!outcome.content_type_ok);
        assert!(log.checks()[0].detail.contains("used=<none>"));
    }

    #[test]
    fn test_inspect_content_type_parameters_ignored() {
        let mut log = CheckLog::new();
        let outcome = checker().inspect(
            &response(200, Some("application/sand+xml; charset=UTF-8"), &valid_body()),
            None,
            &mut log,
        );
        assert!(outcome.passed());
    }

    #[test]
    fn test_inspect_status_mismatch() {
        let mut log = CheckLog::new();
        let outcome = checker().inspect(
            &response(500, Some(SAND_CONTENT_TYPE), &valid_body()),
            Some(&pattern("4[0-9]{2}")),
            &mut log,
        );
        assert_eq!(outcome.status_ok, Some(false));
        assert!(!outcome.passed());
        assert_eq!(log.checks()[1].detail, "value=500|regex=4[0-9]{2}");
    }

    struct Reject;

    impl MessageValidator for Reject {
        fn validate(&self, _body: &[u8]) -> XmlVerdict {
            XmlVerdict::ValidatorError("schema unavailable".to_owned())
        }
    }

    #[test]
    fn test_custom_validator_error_fails_xml_rule() {
        let mut log = CheckLog::new();
        let outcome = checker().with_validator(Reject).inspect(
            &response(200, Some(SAND_CONTENT_TYPE), &valid_body()),
            None,
            &mut log,
        );
        assert!(!outcome.xml_ok);
        assert!(log.checks()[1].detail.contains("schema unavailable"));
    }

    #[test]
    fn test_resolve_header_url() {
        let base = Url::parse("http://dane.example/a/start").unwrap();
        assert_eq!(
            resolve_header_url(&base, "http://other.example/msg")
                .unwrap()
                .as_str(),
            "http://other.example/msg"
        );
        assert_eq!(
            resolve_header_url(&base, "msg.xml").unwrap().as_str(),
            "http://dane.example/a/msg.xml"
        );
        assert!(resolve_header_url(&base, "ftp://dane.example/msg").is_err());
    }
}
