//! Background flusher that periodically drains the queue and hands batch
//! requests to a delivery seam. Channel-free variant of the usual
//! batch-writer loop: the queue itself is the buffer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use flowkit_core::error::FlowResult;

use crate::batch::BatchRequest;
use crate::queue::EventBatchQueue;

/// Delivery seam for serialized batches. The real network layer implements
/// this over HTTP; the SDK core never issues requests itself.
pub trait BatchSender: Send + Sync {
    fn deliver(&self, request: &BatchRequest) -> FlowResult<()>;
}

/// Stand-in sender that serializes the request and logs it.
pub struct LoggingSender;

impl BatchSender for LoggingSender {
    fn deliver(&self, request: &BatchRequest) -> FlowResult<()> {
        let body = serde_json::to_string(request)?;
        info!(events = request.batch.len(), %body, "Delivering batch");
        Ok(())
    }
}

/// Periodic drain loop. Undelivered items stay queued: a failed delivery
/// re-enqueues nothing because `drain` already removed them, so the sender
/// is expected to retry internally or drop — idempotency keys make retries
/// safe downstream.
pub struct BatchFlusher {
    handle: JoinHandle<()>,
}

impl BatchFlusher {
    pub fn spawn(
        queue: Arc<EventBatchQueue>,
        sender: Arc<dyn BatchSender>,
        max_batch_size: usize,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                flush_once(&queue, sender.as_ref(), max_batch_size);
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

/// Drains one batch and delivers it, if there is anything to send.
pub fn flush_once(queue: &EventBatchQueue, sender: &dyn BatchSender, max_batch_size: usize) {
    if queue.is_empty() {
        return;
    }
    let request = queue.drain(max_batch_size);
    if let Err(err) = sender.deliver(&request) {
        warn!(error = %err, events = request.batch.len(), "Batch delivery failed");
    }
}
