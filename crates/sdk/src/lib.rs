//! FlowKit client facade — the host application's entry point. Wires the
//! trigger broker, bridge dispatcher, journey tracker, and event batch
//! queue behind one narrow API.

pub mod client;

pub use client::{FlowKit, Product, PurchaseHandler};
