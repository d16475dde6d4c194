//! Bridge dispatcher — the two-way message channel between host code and
//! the embedded content renderer. Only this crate reads from or writes to
//! the renderer transport; everything else goes through the typed API.

pub mod dispatcher;
pub mod trace;
pub mod transport;

pub use dispatcher::{BridgeDispatcher, MessageHandler};
pub use trace::{RuntimeTraceFixture, TraceEntry, TraceKind, TraceRecorder};
pub use transport::{ChannelTransport, RendererTransport};
