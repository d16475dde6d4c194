//! FIFO buffer between event producers and the network layer.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::batch::{BatchEventItem, BatchRequest};
use crate::sink::EventSink;

/// Accumulates tracked events in arrival order. No deduplication happens
/// here — that is the network layer's job via `idempotency_key` — and no
/// timestamps are fabricated for items enqueued without one.
#[derive(Default)]
pub struct EventBatchQueue {
    items: Mutex<VecDeque<BatchEventItem>>,
}

impl EventBatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends in arrival order.
    pub fn enqueue(&self, item: BatchEventItem) {
        debug!(event = %item.event, distinct_id = %item.distinct_id, "Enqueuing event");
        self.items.lock().push_back(item);
    }

    /// Removes up to `max_batch_size` items in FIFO order. Items not
    /// drained stay queued for the next attempt.
    pub fn drain(&self, max_batch_size: usize) -> BatchRequest {
        BatchRequest::new(self.take(max_batch_size))
    }

    /// Like `drain`, but marks the batch as backfill traffic.
    pub fn drain_historical(&self, max_batch_size: usize) -> BatchRequest {
        BatchRequest::historical(self.take(max_batch_size))
    }

    fn take(&self, max_batch_size: usize) -> Vec<BatchEventItem> {
        let mut items = self.items.lock();
        let count = max_batch_size.min(items.len());
        items.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl EventSink for EventBatchQueue {
    fn emit(&self, item: BatchEventItem) {
        self.enqueue(item);
    }
}
