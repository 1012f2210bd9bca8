//! Transport port and its HTTP implementation.
//!
//! Workers never talk to the network directly. They go through [`Transport`],
//! which can be swapped out for an in-memory implementation in tests.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONNECTION, CONTENT_LENGTH, RANGE};

use crate::config::DownloadConfig;
use crate::error::TransportError;

/// Source of resource metadata and range-restricted byte streams.
pub trait Transport: Send + Sync {
    /// Get the total length of the resource.
    ///
    /// Returns `Ok(None)` if the resource does not report a length.
    fn probe_length(&self, url: &str) -> Result<Option<u64>, TransportError>;

    /// Open a stream over the inclusive byte interval `[start, end_inclusive]`.
    ///
    /// The status is returned as-is; callers decide what counts as success.
    fn open_range(
        &self,
        url: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<RangeResponse, TransportError>;
}

/// Status and body of a range request.
pub struct RangeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Box<dyn Read + Send>,
}

impl RangeResponse {
    /// Create a response from a status and a readable body.
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// Whether the status is in the 2xx class.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Format an HTTP `Range` header value for an inclusive interval.
pub(crate) fn range_header(start: u64, end_inclusive: u64) -> String {
    format!("bytes={}-{}", start, end_inclusive)
}

/// [`Transport`] over HTTP using a blocking `reqwest` client.
///
/// One client is shared by all workers of a job; `reqwest` pools connections
/// internally.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from the timeouts and user agent in `config`.
    pub fn new(config: &DownloadConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// Request timeout this transport was built with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl Transport for HttpTransport {
    fn probe_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| self.map_error(url, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Request {
                url: url.to_string(),
                reason: format!("HEAD request failed with status {}", response.status()),
            });
        }

        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        tracing::debug!(url, ?length, "Probed resource length");
        Ok(length)
    }

    fn open_range(
        &self,
        url: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<RangeResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, range_header(start, end_inclusive))
            .header(CONNECTION, "keep-alive")
            .send()
            .map_err(|e| self.map_error(url, e))?;

        Ok(RangeResponse::new(response.status().as_u16(), response))
    }
}
