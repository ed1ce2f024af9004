//! HTTP fetcher implementation
//!
//! This module handles all page retrieval for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with Content-Type inspection
//! - Error classification (timeout, network, HTTP status, body read)
//! - The fetch-then-extract step used by every worker

use crate::config::{FetchConfig, UserAgentConfig};
use crate::crawler::parser::{extract_refs, ExtractedRefs};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Media type prefix a response must carry to be parsed
const HTML_MEDIA_TYPE: &str = "text/html";

/// Errors retrieving a single resource
///
/// A fetch error only ever affects the URL being fetched; the worker logs
/// it and moves on to its next claim.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {reason}")]
    Body { url: String, reason: String },
}

/// A retrieved resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Content-Type header value (empty if absent)
    pub content_type: String,

    /// Decoded body; fetchers may leave this empty for non-HTML resources
    pub body: String,
}

impl FetchedResource {
    /// Returns true if the Content-Type begins with `text/html`
    pub fn is_html(&self) -> bool {
        is_html_content_type(&self.content_type)
    }
}

/// Outcome of fetching and extracting one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Page was HTML and its references were extracted
    Extracted(ExtractedRefs),

    /// Page was not HTML; nothing was extracted
    SkippedNonHtml { content_type: String },
}

/// Something that can retrieve a resource by URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves `url`, surfacing transport failures as [`FetchError`]
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// The user agent is formatted as `Name/Version (+ContactURL; ContactEmail)`.
/// Redirects are followed with reqwest's default policy (up to 10 hops).
pub fn build_http_client(
    fetch: &FetchConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a client built from configuration
    pub fn new(fetch: &FetchConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(fetch, user_agent)?))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Sends a single GET
    ///
    /// The body is only downloaded for HTML responses; other content types
    /// come back with an empty body.
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html_content_type(&content_type) {
            return Ok(FetchedResource {
                content_type,
                body: String::new(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedResource { content_type, body })
    }
}

/// Fetches a page and extracts its raw anchor and image references
///
/// A non-HTML Content-Type is a normal outcome, reported as
/// [`FetchOutcome::SkippedNonHtml`] rather than an error.
pub async fn fetch_and_extract(
    fetcher: &dyn Fetcher,
    url: &str,
) -> Result<FetchOutcome, FetchError> {
    let resource = fetcher.fetch(url).await?;

    if !resource.is_html() {
        return Ok(FetchOutcome::SkippedNonHtml {
            content_type: resource.content_type,
        });
    }

    Ok(FetchOutcome::Extracted(extract_refs(&resource.body)))
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..HTML_MEDIA_TYPE.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HTML_MEDIA_TYPE))
}
