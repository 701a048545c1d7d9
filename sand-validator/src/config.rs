//! Configuration types for SAND conformance checks.
//!
//! Split into HTTP client options and check options so the check engine
//! does not have to know how requests are issued.

use std::time::Duration;

use sand_message::{Limits, SAND_CONTENT_TYPE};

use crate::mode::StatusPattern;

/// HTTP client options.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    /// Total time allowed for one request, body included (default: 30 s).
    pub timeout: Duration,
    /// Time allowed to establish the TCP/TLS connection (default: 10 s).
    pub connect_timeout: Duration,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Maximum number of redirects followed per request (default: 10).
    /// `0` returns redirect responses as they are.
    pub max_redirects: usize,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` (default: true).
    pub system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("sand-client/", env!("CARGO_PKG_VERSION")).to_owned(),
            max_redirects: 10,
            system_proxy: true,
        }
    }
}

/// Check options.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CheckConfig {
    pub client: ClientConfig,
    /// Media type the SAND message must be served with.
    /// Compared case-insensitively; media type parameters are ignored.
    pub expected_content_type: String,
    /// Replaces the status pattern implied by the mode, if set.
    pub status_override: Option<StatusPattern>,
    /// Largest message body the validator accepts (default: 1 MiB).
    pub max_message_bytes: usize,
    /// Deepest element nesting the validator accepts (default: 64).
    pub max_depth: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            client: ClientConfig::default(),
            expected_content_type: SAND_CONTENT_TYPE.to_owned(),
            status_override: None,
            max_message_bytes: limits.max_bytes,
            max_depth: limits.max_depth,
        }
    }
}

impl CheckConfig {
    /// Parser limits derived from this config.
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            max_bytes: self.max_message_bytes,
            max_depth: self.max_depth,
        }
    }
}
