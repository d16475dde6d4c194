use flowkit_core::envelope::Envelope;
use flowkit_core::error::{FlowError, FlowResult};
use tokio::sync::mpsc;

/// Write half of the renderer channel. The dispatcher is the only caller.
pub trait RendererTransport: Send + Sync {
    fn send(&self, envelope: Envelope) -> FlowResult<()>;
}

/// Transport backed by an in-process channel. Used by the demo binary's
/// loopback renderer and by tests; a webview bridge implements the same
/// trait over its evaluate-javascript boundary.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RendererTransport for ChannelTransport {
    fn send(&self, envelope: Envelope) -> FlowResult<()> {
        self.tx
            .send(envelope)
            .map_err(|_| FlowError::ChannelClosed)
    }
}
