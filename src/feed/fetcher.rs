use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::feed::parser::parse_feed;
use crate::model::ParsedFeed;
use crate::util::{validate_url, UrlValidationError};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Default per-request timeout for feed downloads.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const USER_AGENT: &str = concat!("feedpress/", env!("CARGO_PKG_VERSION"));

/// Errors returned by a [`FeedSource`].
///
/// Both variants are recoverable: the pipeline turns them into a per-feed
/// outcome and moves on to the next feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL failed syntax validation; no request was made.
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// The request or the parse failed.
    #[error("Feed fetch failed: {0}")]
    FetchFailed(#[from] FetchFailure),
}

/// Why a feed (or image) download failed.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Where the pipeline gets feeds from.
///
/// Implementations must validate the URL before any I/O and must return
/// failures as values; nothing here may abort a run.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError>;
}

/// HTTP feed source backed by reqwest and feed-rs.
///
/// One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    /// Builds a fetcher with its own HTTP client.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Builds a fetcher around an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let url = validate_url(url)?;

        let bytes = download(&self.client, url.as_str(), self.timeout, MAX_FEED_SIZE).await?;

        let feed = parse_feed(&bytes).map_err(|e| FetchFailure::Parse(e.to_string()))?;

        tracing::debug!(
            feed = %url,
            items = feed.items.len(),
            "Fetched feed"
        );
        Ok(feed)
    }
}

/// Single GET with a timeout, a 2xx check and a body size limit.
async fn download(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    limit: usize,
) -> Result<Vec<u8>, FetchFailure> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| FetchFailure::Timeout)??;

    if !response.status().is_success() {
        return Err(FetchFailure::HttpStatus(response.status().as_u16()));
    }

    tokio::time::timeout(timeout, read_limited_bytes(response, limit))
        .await
        .map_err(|_| FetchFailure::Timeout)?
}

/// Content-Type of a response, without parameters.
pub(crate) fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
}

pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchFailure> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchFailure::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchFailure::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchFailure::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
