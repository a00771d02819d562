use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, ParseError, ParsedFeed};

const MAX_REDIRECTS: usize = 3;

/// Errors that can occur while retrieving and decoding a feed.
///
/// Every variant is per-feed: the batch driver logs it and moves on to the
/// next feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, redirect policy, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be decoded as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Knobs for a single feed fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Applies separately to sending the request and to reading the body
    pub timeout: Duration,
    pub max_size: usize,
    /// Retries after a 429, 5xx or truncated body
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry
    pub retry_base_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_size: 10 * 1024 * 1024, // 10MB
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

impl FetchOptions {
    fn backoff(&self, retry: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Build the shared HTTP client used for all feed fetches.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(redirect_policy())
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Retrieve a feed document and decode it.
///
/// # Errors
///
/// - [`FetchError::Network`] / [`FetchError::Timeout`]: the URL is unreachable
/// - [`FetchError::HttpStatus`]: non-2xx response (4xx fail immediately, 5xx after retries)
/// - [`FetchError::RateLimited`]: 429 after max retries
/// - [`FetchError::ResponseTooLarge`] / [`FetchError::IncompleteResponse`]
/// - [`FetchError::Parse`]: the body is not a feed
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<ParsedFeed, FetchError> {
    let bytes = fetch_bytes(client, url, options).await?;
    let feed = parse_feed(&bytes)?;
    tracing::debug!(feed = %url, entries = feed.entries.len(), "Feed decoded");
    Ok(feed)
}

async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(options.timeout, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)??;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= options.max_retries {
                return Err(FetchError::RateLimited(options.max_retries));
            }
            let delay = options.backoff(retry_count);
            tracing::warn!(
                feed = %url,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if status.is_server_error() {
            if retry_count >= options.max_retries {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
            let delay = options.backoff(retry_count);
            tracing::warn!(
                feed = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Server error, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = tokio::time::timeout(
            options.timeout,
            read_limited_bytes(response, options.max_size),
        )
        .await
        .map_err(|_| FetchError::Timeout)?;

        match body {
            Ok(bytes) => return Ok(bytes),
            Err(FetchError::IncompleteResponse { expected, received })
                if retry_count < options.max_retries =>
            {
                let delay = options.backoff(retry_count);
                tracing::debug!(
                    feed = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
