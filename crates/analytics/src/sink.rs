//! Event sink — the seam through which any module appends tracked events
//! to the batch pipeline without owning the queue.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::batch::BatchEventItem;

/// Trait for appending tracked events. The batch queue is the production
/// implementation; tests use `CaptureSink`.
pub trait EventSink: Send + Sync {
    fn emit(&self, item: BatchEventItem);
}

/// No-op sink for modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _item: BatchEventItem) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<BatchEventItem>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BatchEventItem> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_event(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| e.event == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, item: BatchEventItem) {
        self.events.lock().push(item);
    }
}

/// Convenience: a no-op sink for modules that don't track events.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
