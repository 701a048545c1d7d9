//! Single-request HTTP fetcher.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use reqwest::header::HeaderMap;
use url::Url;

use crate::config::ClientConfig;
use crate::error::FetchError;

/// A fetched HTTP response. Header names are lower case; repeated headers
/// are joined with `", "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Final URL, after redirects.
    pub url: Url,
    pub status: u16,
    /// Canonical reason phrase for `status`, empty if unknown.
    pub reason: String,
    pub headers: BTreeMap<String, String>,
    /// Response body. With a body limit set, reading stops one byte past
    /// the limit, so an oversized body is still recognizable as such.
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `Content-Type` media type without parameters, lower-cased.
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Issues GET requests with a preconfigured client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    body_limit: Option<usize>,
}

impl HttpFetcher {
    /// Build a fetcher from client options.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(redirect_policy(config.max_redirects));
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self {
            client,
            body_limit: None,
        })
    }

    /// Stop reading response bodies once they are larger than `limit` bytes.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    /// Parse `url` and fetch it.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the URL is invalid or the request fails.
    /// HTTP error statuses are not errors.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let url = parse_http_url(url)?;
        self.fetch_url(&url, HeaderMap::new()).await
    }

    /// Fetch an already parsed URL, sending `headers` along with the request.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the URL is not http(s) or the request fails.
    pub async fn fetch_url(&self, url: &Url, headers: HeaderMap) -> Result<FetchResult, FetchError> {
        ensure_http(url)?;
        tracing::debug!(%url, "GET");

        let res = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;

        let final_url = res.url().clone();
        let status = res.status();
        let headers = flatten_headers(res.headers());
        let body = self.read_body(res, url).await?;

        tracing::debug!(
            url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            "response received"
        );

        Ok(FetchResult {
            url: final_url,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }

    async fn read_body(
        &self,
        mut res: reqwest::Response,
        url: &Url,
    ) -> Result<Vec<u8>, FetchError> {
        let Some(limit) = self.body_limit else {
            let body = res.bytes().await.map_err(|e| body_error(url, e))?;
            return Ok(body.to_vec());
        };

        let declared = res.content_length().and_then(|n| usize::try_from(n).ok());
        if let Some(declared) = declared
            && declared > limit
        {
            tracing::debug!(%url, declared, limit, "declared body length exceeds the limit");
        }

        let cap = limit.saturating_add(1);
        let mut body = Vec::with_capacity(declared.unwrap_or(0).min(cap));
        while let Some(chunk) = res.chunk().await.map_err(|e| body_error(url, e))? {
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                body.truncate(cap);
                tracing::debug!(%url, limit, "body exceeds the limit, stopped reading");
                break;
            }
        }
        Ok(body)
    }
}

fn send_error(url: &Url, source: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if source.is_timeout() {
        FetchError::Timeout { url, source }
    } else {
        FetchError::Network { url, source }
    }
}

fn body_error(url: &Url, source: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if source.is_timeout() {
        FetchError::Timeout { url, source }
    } else {
        FetchError::Body { url, source }
    }
}

/// Parse an absolute `http`/`https` URL.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] or [`FetchError::UnsupportedScheme`].
pub fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url.trim()).map_err(|source| FetchError::InvalidUrl {
        url: url.to_owned(),
        source,
    })?;
    ensure_http(&parsed)?;
    Ok(parsed)
}

fn ensure_http(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::UnsupportedScheme {
            url: url.to_string(),
            scheme: other.to_owned(),
        }),
    }
}

fn redirect_policy(max_redirects: usize) -> reqwest::redirect::Policy {
    if max_redirects == 0 {
        // limited(0) turns the first redirect into an error
        reqwest::redirect::Policy::none()
    } else {
        reqwest::redirect::Policy::limited(max_redirects)
    }
}

fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match out.entry(name.as_str().to_owned()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }
    out
}
