//! Single serialized registry mapping event ids to completion handlers.
//!
//! Delivery policy: an `emit` for an event id with no registered handler is
//! a silent no-op — there is no buffering, so emits that race ahead of
//! registration are lost. Hosts that need the update must register before
//! anything can deliver it. Tests depend on this behavior.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::TriggerUpdate;

pub type TriggerHandler = Arc<dyn Fn(TriggerUpdate) + Send + Sync>;

/// Decouples "something triggered event X" from "whoever is waiting for
/// event X's outcome".
///
/// Registry operations are serialized behind one mutex; handler bodies run
/// on a dedicated dispatch task, never under that mutex and never
/// concurrently with each other, so a slow handler cannot block
/// `register`/`emit`/`complete`.
#[derive(Clone)]
pub struct TriggerBroker {
    handlers: Arc<Mutex<HashMap<String, TriggerHandler>>>,
    dispatch_tx: mpsc::UnboundedSender<(TriggerHandler, TriggerUpdate)>,
}

impl TriggerBroker {
    /// Creates a broker and spawns its dispatch task. Requires a running
    /// tokio runtime.
    pub fn new() -> Self {
        let (dispatch_tx, mut dispatch_rx) =
            mpsc::unbounded_channel::<(TriggerHandler, TriggerUpdate)>();

        tokio::spawn(async move {
            while let Some((handler, update)) = dispatch_rx.recv().await {
                handler(update);
            }
        });

        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            dispatch_tx,
        }
    }

    /// Stores exactly one handler per event id; a second registration for
    /// the same id replaces the first (last writer wins).
    pub fn register(&self, event_id: impl Into<String>, handler: TriggerHandler) {
        let event_id = event_id.into();
        debug!(event_id = %event_id, "Registering trigger handler");
        self.handlers.lock().insert(event_id, handler);
    }

    /// Delivers `update` to the handler for `event_id`, exactly once, on
    /// the dispatch task. No handler registered: silent no-op.
    pub fn emit(&self, event_id: &str, update: TriggerUpdate) {
        let handler = self.handlers.lock().get(event_id).cloned();
        match handler {
            Some(handler) => {
                let _ = self.dispatch_tx.send((handler, update));
            }
            None => {
                debug!(event_id = %event_id, "No trigger handler registered, dropping update");
            }
        }
    }

    /// Removes the handler, making the event id available for reuse. Call
    /// after a terminal update so the registry does not grow unbounded.
    pub fn complete(&self, event_id: &str) {
        self.handlers.lock().remove(event_id);
    }

    /// Clears all handlers unconditionally. Used for test isolation and
    /// full-SDK resets.
    pub fn reset(&self) {
        self.handlers.lock().clear();
    }

    pub fn registered_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

impl Default for TriggerBroker {
    fn default() -> Self {
        Self::new()
    }
}
