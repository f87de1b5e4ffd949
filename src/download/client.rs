//! HTTP transport for range requests.
//!
//! [`HttpClient`] issues `Range: bytes=<offset>-` GETs and hands the engine
//! the status, the two headers it validates, and the body as a stream. It
//! does not judge the status itself; the engine decides what is fatal.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, HeaderName, RANGE};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::user_agent;

/// Response body delivered as a stream of chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// The parts of a range response the engine inspects.
pub struct RangeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw `Content-Range` header, if any.
    pub content_range: Option<String>,
    /// Body, not yet read.
    pub body: BodyStream,
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

/// Capability to issue an open-ended range GET.
#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// Requests `url` from byte `offset` to the end.
    async fn fetch(&self, url: &str, offset: u64) -> Result<RangeResponse, DownloadError>;
}

/// HTTP client for range requests, created once and shared across sessions.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with a 30 second connect timeout and no overall
    /// request timeout; a stalled range request stalls only its session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, None)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be constructed.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: Option<u64>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .user_agent(user_agent::default_download_user_agent());
        if let Some(secs) = read_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl RangeTransport for HttpClient {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str, offset: u64) -> Result<RangeResponse, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={offset}-"))
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status().as_u16();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_range = header(CONTENT_RANGE);
        debug!(status, ?content_type, ?content_range, "range response");

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(owned_url.clone(), e)))
            .boxed();

        Ok(RangeResponse {
            status,
            content_type,
            content_range,
            body,
        })
    }
}
