//! Media extraction orchestrator.
//!
//! Per message: detect a platform URL, extract download targets through the
//! external API, download each item within the size cap, and relay it through
//! the transport. Every network step runs under its own retry policy, and the
//! whole sequence is raced against a hard wall-clock timeout. Per-item
//! failures are logged and siblings continue; success means at least one
//! delivery.

/// Extraction API client.
pub mod extractor;
/// Bounded media downloads.
pub mod fetch;
/// Platform URL detection.
pub mod patterns;

use crate::config;
use crate::presence;
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{InboundMessage, TransportError};
use extractor::{ExtractError, Extraction, ExtractorClient};
use fetch::MediaFetcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Best-effort notice sent when a detected link could not be processed.
pub const MEDIA_FAILURE_REPLY: &str =
    "Sorry, I couldn't process that media link. Please try again later.";

/// Result of running the orchestrator against one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    /// The body carries no recognized platform URL; the pipeline should fall
    /// through to other handling.
    NotDetected,
    /// At least one media item was delivered.
    Delivered {
        /// The detected platform URL.
        url: String,
    },
    /// A URL was detected but nothing could be delivered (or the timeout
    /// fired). A failure notice has been attempted.
    Failed {
        /// The detected platform URL.
        url: String,
    },
}

struct DownloadTarget {
    url: String,
    filename: Option<String>,
}

fn collect_targets(extraction: Extraction) -> Vec<DownloadTarget> {
    match extraction {
        // Only photo items are worth downloading from a picker.
        Extraction::Picker(items) => items
            .into_iter()
            .filter(|item| item.is_photo())
            .map(|item| DownloadTarget {
                url: item.url,
                filename: None,
            })
            .collect(),
        Extraction::Direct { urls, filename } => urls
            .into_iter()
            .map(|url| DownloadTarget {
                url,
                filename: filename.clone(),
            })
            .collect(),
    }
}

/// Drives one message through extraction, download, and delivery.
#[derive(Clone)]
pub struct MediaOrchestrator {
    extractor: ExtractorClient,
    fetcher: MediaFetcher,
    processing_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl MediaOrchestrator {
    /// Creates an orchestrator with the default fetcher and tuning.
    #[must_use]
    pub fn new(extractor: ExtractorClient) -> Self {
        Self {
            extractor,
            fetcher: MediaFetcher::new(),
            processing_timeout: config::PROCESSING_TIMEOUT,
            max_retries: config::MAX_RETRIES,
            retry_base_delay: config::RETRY_BASE_DELAY,
        }
    }

    /// Replaces the media fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: MediaFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Overrides the per-call processing timeout.
    #[must_use]
    pub fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = timeout;
        self
    }

    /// Overrides the retry tuning for all network steps.
    #[must_use]
    pub fn with_retry_tuning(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Runs the orchestrator against one message.
    ///
    /// Never fails from the caller's perspective: errors and timeouts are
    /// folded into [`MediaOutcome::Failed`] after a best-effort notice.
    pub async fn handle(&self, message: Arc<dyn InboundMessage>) -> MediaOutcome {
        let Some(found) = patterns::detect_url(message.body()) else {
            return MediaOutcome::NotDetected;
        };
        let url = found.to_owned();

        let chat = message.chat();
        presence::set_typing(chat.as_ref()).await;

        let worker = {
            let this = self.clone();
            let message = Arc::clone(&message);
            let url = url.clone();
            tokio::spawn(async move { this.deliver_all(&url, message).await })
        };

        // The loser of this race is discarded, not cancelled: on timeout the
        // spawned task keeps running detached and its eventual result is
        // dropped.
        let delivered = match tokio::time::timeout(self.overall_timeout(), worker).await {
            Ok(Ok(delivered)) => delivered,
            Ok(Err(join_err)) => {
                error!(error = %join_err, url = %url, "media delivery task failed");
                false
            }
            Err(_) => {
                warn!(
                    url = %url,
                    timeout_ms = self.overall_timeout().as_millis() as u64,
                    "media processing timed out"
                );
                false
            }
        };

        if delivered {
            MediaOutcome::Delivered { url }
        } else {
            self.notify_failure(message.as_ref()).await;
            MediaOutcome::Failed { url }
        }
    }

    fn overall_timeout(&self) -> Duration {
        // 1.5x the per-call timeout bounds the whole sequence.
        self.processing_timeout + self.processing_timeout / 2
    }

    async fn deliver_all(&self, url: &str, message: Arc<dyn InboundMessage>) -> bool {
        let extraction = {
            let policy = self.extract_policy(url);
            with_retry(&policy, || self.extractor.extract(url)).await
        };
        let extraction = match extraction {
            Ok(extraction) => extraction,
            Err(err) => {
                error!(error = %err, url = %url, "media extraction failed");
                return false;
            }
        };

        let targets = collect_targets(extraction);
        if targets.is_empty() {
            debug!(url = %url, "extraction yielded no downloadable items");
            return false;
        }

        let mut delivered = 0usize;
        for target in &targets {
            match self.deliver_one(target, message.as_ref()).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        error = %err,
                        item = %target.url,
                        "media item failed, continuing with remaining items"
                    );
                }
            }
        }
        delivered > 0
    }

    async fn deliver_one(
        &self,
        target: &DownloadTarget,
        message: &dyn InboundMessage,
    ) -> anyhow::Result<()> {
        let payload = {
            let policy = self.download_policy(&target.url);
            with_retry(&policy, || {
                self.fetcher.download(&target.url, target.filename.as_deref())
            })
            .await?
        };
        debug!(
            item = %target.url,
            content_type = %payload.content_type,
            size = payload.data.len(),
            "downloaded media item"
        );

        // Audio goes out as a plain file, never a voice note.
        let policy = self.delivery_policy();
        with_retry(&policy, || message.reply_media(&payload, false)).await?;
        Ok(())
    }

    fn extract_policy(&self, url: &str) -> RetryPolicy<ExtractError> {
        let url = url.to_owned();
        RetryPolicy::new(
            self.max_retries,
            self.retry_base_delay,
            ExtractError::is_transient,
        )
        .with_on_retry(move |err, attempt| {
            warn!(error = %err, attempt, url = %url, "retrying media extraction");
        })
    }

    fn download_policy(&self, url: &str) -> RetryPolicy<ExtractError> {
        let url = url.to_owned();
        RetryPolicy::new(
            self.max_retries,
            self.retry_base_delay,
            ExtractError::is_transient,
        )
        .with_on_retry(move |err, attempt| {
            warn!(error = %err, attempt, url = %url, "retrying media download");
        })
    }

    fn delivery_policy(&self) -> RetryPolicy<TransportError> {
        RetryPolicy::new(
            self.max_retries,
            self.retry_base_delay,
            TransportError::is_transient,
        )
    }

    async fn notify_failure(&self, message: &dyn InboundMessage) {
        if let Err(err) = message.reply_text(MEDIA_FAILURE_REPLY).await {
            debug!(error = %err, "failed to send media failure notice");
        }
    }
}
