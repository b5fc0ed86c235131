//! Bounded media downloads.
//!
//! Payloads are streamed into memory with the size cap enforced both from
//! the `Content-Length` header and while the body arrives, so a lying server
//! cannot blow past the limit.

use super::extractor::ExtractError;
use crate::config;
use crate::transport::MediaPayload;
use bytes::BytesMut;
use futures_util::StreamExt;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Downloads media items within a payload size cap.
#[derive(Clone)]
pub struct MediaFetcher {
    http: reqwest::Client,
    max_bytes: u64,
}

impl MediaFetcher {
    /// Creates a fetcher with the default size cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_bytes(config::MAX_DOWNLOAD_BYTES)
    }

    /// Creates a fetcher with a custom size cap.
    #[must_use]
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config::DOWNLOAD_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, max_bytes }
    }

    /// Downloads `url` into memory, detecting the content type from the
    /// response headers.
    ///
    /// # Errors
    ///
    /// `Timeout`/`Network` on connectivity problems, `Status` for non-2xx
    /// answers, `TooLarge` once the payload exceeds the cap.
    pub async fn download(
        &self,
        url: &str,
        filename: Option<&str>,
    ) -> Result<MediaPayload, ExtractError> {
        let response = self
            .http
            .get(url)
            .header("accept", "image/*, video/*, audio/*")
            .send()
            .await
            .map_err(ExtractError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(ExtractError::TooLarge(length));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_owned();

        let mut data = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ExtractError::from)?;
            let total = (data.len() + chunk.len()) as u64;
            if total > self.max_bytes {
                return Err(ExtractError::TooLarge(total));
            }
            data.extend_from_slice(&chunk);
        }

        Ok(MediaPayload {
            content_type,
            data: data.freeze(),
            filename: filename.map(ToOwned::to_owned),
        })
    }
}

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}
