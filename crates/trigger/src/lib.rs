//! Trigger broker — routes asynchronous flow-completion notifications back
//! to whoever registered interest in the triggering event.

pub mod broker;
pub mod types;

pub use broker::{TriggerBroker, TriggerHandler};
pub use types::{TriggerPayload, TriggerUpdate};
