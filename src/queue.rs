//! Message queue and fixed-interval drain loop.
//!
//! The queue is a plain FIFO: insertion order is arrival order, no priority.
//! The pump drains it one message at a time, awaiting all downstream work
//! before popping the next, so side effects stay serialized and messages
//! complete in arrival order. Enqueueing only touches the tail under a short
//! lock, so a slow message never blocks ingestion.

use crate::pipeline::MessagePipeline;
use crate::transport::InboundMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// FIFO buffer of inbound messages awaiting processing.
#[derive(Default)]
pub struct MessageQueue {
    entries: Mutex<VecDeque<Arc<dyn InboundMessage>>>,
}

impl MessageQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the tail. Messages with an empty body are
    /// silently dropped.
    pub fn enqueue(&self, message: Arc<dyn InboundMessage>) {
        if message.body().is_empty() {
            return;
        }
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(message);
    }

    /// Pops the head of the queue.
    pub fn pop(&self) -> Option<Arc<dyn InboundMessage>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drains the queue on a fixed interval, one message at a time.
pub struct MessagePump {
    queue: Arc<MessageQueue>,
    pipeline: Arc<MessagePipeline>,
    interval: Duration,
}

impl MessagePump {
    /// Creates a pump over `queue` feeding `pipeline`.
    #[must_use]
    pub fn new(
        queue: Arc<MessageQueue>,
        pipeline: Arc<MessagePipeline>,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            pipeline,
            interval,
        }
    }

    /// Runs drain cycles until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("message pump stopping");
                    break;
                }
                _ = ticker.tick() => self.drain().await,
            }
        }
    }

    /// Processes every currently buffered message in arrival order. Each
    /// message is fully completed (or failed and logged inside the pipeline)
    /// before the next is popped.
    pub async fn drain(&self) {
        while let Some(message) = self.queue.pop() {
            self.pipeline.process(message).await;
        }
    }
}
