//! Event batching — accumulates tracked events and serializes them into
//! outbound batch requests for network delivery.

pub mod batch;
pub mod flusher;
pub mod queue;
pub mod sink;

pub use batch::{BatchEventItem, BatchRequest};
pub use flusher::{BatchFlusher, BatchSender, LoggingSender};
pub use queue::EventBatchQueue;
pub use sink::{capture_sink, noop_sink, CaptureSink, EventSink, NoOpSink};
