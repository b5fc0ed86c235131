//! Client for the external media extraction API.
//!
//! The API takes a platform URL plus quality hints as a JSON body and
//! answers either with a picker (several candidate items) or with one or
//! more direct download URLs.

use crate::config;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Extraction and download failures.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The request timed out.
    #[error("extractor request timed out")]
    Timeout,
    /// Connectivity-level failure.
    #[error("extractor network error: {0}")]
    Network(String),
    /// The remote answered with a non-success status.
    #[error("extractor returned status {0}")]
    Status(u16),
    /// The response body violated the wire contract (including empty bodies).
    #[error("extractor response malformed: {0}")]
    Malformed(String),
    /// The payload exceeds the download size cap.
    #[error("media payload too large: {0} bytes")]
    TooLarge(u64),
}

impl ExtractError {
    /// Whether a retry has any chance of succeeding: timeouts, network
    /// failures, and 5xx. Malformed payloads and 4xx never retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status(status) => *status >= 500,
            Self::Malformed(_) | Self::TooLarge(_) => false,
        }
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// One candidate item in a picker response.
#[derive(Debug, Clone)]
pub struct PickerItem {
    /// Item type tag as reported by the API (`photo`, `video`, `gif`, ...).
    pub kind: String,
    /// Source URL of the item.
    pub url: String,
}

impl PickerItem {
    /// Whether the item is a downloadable photo.
    #[must_use]
    pub fn is_photo(&self) -> bool {
        self.kind == "photo"
    }
}

/// A classified extraction response.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// Several candidate items to pick from.
    Picker(Vec<PickerItem>),
    /// One or more direct download URLs.
    Direct {
        /// Download URLs, in order.
        urls: Vec<String>,
        /// Optional filename suggested by the API.
        filename: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawExtraction {
    status: Option<String>,
    picker: Option<Vec<RawPickerItem>>,
    url: Option<UrlField>,
    filename: Option<String>,
}

#[derive(Deserialize)]
struct RawPickerItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UrlField {
    One(String),
    Many(Vec<String>),
}

fn interpret(raw: RawExtraction) -> Result<Extraction, ExtractError> {
    if raw.status.as_deref() == Some("picker") {
        let items = raw.picker.ok_or_else(|| {
            ExtractError::Malformed("picker response without picker items".to_owned())
        })?;
        let items = items
            .into_iter()
            .filter_map(|item| match (item.kind, item.url) {
                (Some(kind), Some(url)) => Some(PickerItem { kind, url }),
                _ => None,
            })
            .collect();
        return Ok(Extraction::Picker(items));
    }

    let urls = match raw.url {
        Some(UrlField::One(url)) => vec![url],
        Some(UrlField::Many(urls)) => urls,
        None => {
            return Err(ExtractError::Malformed(
                "response carries neither picker nor url".to_owned(),
            ))
        }
    };
    if urls.is_empty() {
        return Err(ExtractError::Malformed("empty url list".to_owned()));
    }
    Ok(Extraction::Direct {
        urls,
        filename: raw.filename,
    })
}

/// HTTP client for the extraction endpoint.
#[derive(Clone)]
pub struct ExtractorClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ExtractorClient {
    /// Creates a client posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config::PROCESSING_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Asks the API to extract media for `url`.
    ///
    /// # Errors
    ///
    /// `Timeout`/`Network` on connectivity problems, `Status` for non-2xx
    /// answers, `Malformed` when the body violates the contract.
    pub async fn extract(&self, url: &str) -> Result<Extraction, ExtractError> {
        let payload = json!({
            "url": url,
            "videoQuality": "720",
            "youtubeHLS": true,
            "twitterGif": false,
            "tiktokH265": true,
            "alwaysProxy": true,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(ExtractError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }

        let raw: RawExtraction = response
            .json()
            .await
            .map_err(|err| ExtractError::Malformed(err.to_string()))?;
        interpret(raw)
    }
}
