//! Correlates host-initiated request/response pairs and demultiplexes
//! unsolicited renderer messages by type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use flowkit_core::envelope::{Envelope, TYPE_PING, TYPE_RESPONSE};
use flowkit_core::error::{FlowError, FlowResult};

use crate::transport::RendererTransport;

pub type MessageHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

type PendingReplies = HashMap<String, oneshot::Sender<Envelope>>;

/// Owns the correlation table for host-initiated requests and the handler
/// table for renderer-initiated messages.
///
/// Correlation ids, not arrival order, are authoritative for matching
/// replies: concurrent `send_and_await` calls may see their replies arrive
/// in any order. Host-to-renderer send order is preserved by the transport.
#[derive(Clone)]
pub struct BridgeDispatcher {
    transport: Arc<dyn RendererTransport>,
    pending: Arc<Mutex<PendingReplies>>,
    handlers: Arc<Mutex<HashMap<String, MessageHandler>>>,
}

impl BridgeDispatcher {
    /// Creates a dispatcher over `transport` and spawns the reader task
    /// consuming raw inbound frames. The task ends, failing all pending
    /// waiters with `ChannelClosed`, when the inbound channel closes.
    pub fn new(
        transport: Arc<dyn RendererTransport>,
        mut inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        let pending: Arc<Mutex<PendingReplies>> = Arc::new(Mutex::new(HashMap::new()));
        let handlers: Arc<Mutex<HashMap<String, MessageHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let pending_reader = pending.clone();
        let handlers_reader = handlers.clone();
        let transport_reader = transport.clone();

        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                let envelope = match Envelope::parse(&raw) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(error = %err, "Dropping malformed bridge message");
                        continue;
                    }
                };

                // Replies to host-initiated requests.
                if let Some(reply_to) = envelope.reply_to.clone() {
                    let sender = pending_reader.lock().remove(&reply_to);
                    match sender {
                        Some(sender) => {
                            let _ = sender.send(envelope);
                        }
                        None => {
                            debug!(reply_to = %reply_to, "Dropping reply with no pending request");
                        }
                    }
                    continue;
                }

                // Liveness probe, answered before user handlers are consulted.
                if envelope.msg_type == TYPE_PING {
                    if let Some(id) = &envelope.id {
                        let mut payload = Map::new();
                        payload.insert("result".to_string(), json!("pong"));
                        let pong = Envelope::reply_to(id.clone(), TYPE_RESPONSE, payload);
                        if let Err(err) = transport_reader.send(pong) {
                            warn!(error = %err, "Failed to answer ping");
                        }
                    }
                    continue;
                }

                let handler = handlers_reader.lock().get(&envelope.msg_type).cloned();
                match handler {
                    Some(handler) => handler(envelope),
                    None => {
                        debug!(msg_type = %envelope.msg_type, "No handler for bridge message");
                    }
                }
            }

            // Transport torn down: waiters must fail, not hang. Dropping the
            // senders surfaces as `ChannelClosed` on the awaiting side.
            let drained = std::mem::take(&mut *pending_reader.lock());
            if !drained.is_empty() {
                warn!(count = drained.len(), "Bridge closed with pending requests");
            }
        });

        Self {
            transport,
            pending,
            handlers,
        }
    }

    /// Host → renderer, fire-and-forget.
    pub fn send(&self, msg_type: &str, payload: Map<String, Value>) -> FlowResult<()> {
        self.transport.send(Envelope::new(msg_type, payload))
    }

    /// Host → renderer with a fresh correlation id; suspends until the
    /// matching reply arrives or `timeout` elapses. On timeout the pending
    /// entry is removed, so a late reply is dropped rather than delivered
    /// to a stale waiter.
    pub async fn send_and_await(
        &self,
        msg_type: &str,
        payload: Map<String, Value>,
        timeout: Duration,
    ) -> FlowResult<Envelope> {
        let id = Uuid::new_v4().to_string();
        let envelope = Envelope {
            msg_type: msg_type.to_string(),
            id: Some(id.clone()),
            reply_to: None,
            payload,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);

        if let Err(err) = self.transport.send(envelope) {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(FlowError::ChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(FlowError::Timeout)
            }
        }
    }

    /// Registers the handler for non-reply messages of the given type.
    /// Exactly one handler per type; later registrations replace earlier.
    pub fn on_message(&self, msg_type: impl Into<String>, handler: MessageHandler) {
        self.handlers.lock().insert(msg_type.into(), handler);
    }

    /// Completes a renderer-originated request by sending a message with
    /// `replyTo` set to the request's id.
    pub fn reply(
        &self,
        request_id: &str,
        msg_type: &str,
        payload: Map<String, Value>,
    ) -> FlowResult<()> {
        self.transport
            .send(Envelope::reply_to(request_id, msg_type, payload))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use tokio::time::timeout as tokio_timeout;

    fn setup() -> (
        BridgeDispatcher,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<Envelope>,
    ) {
        let (transport, outbound_rx) = ChannelTransport::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let dispatcher = BridgeDispatcher::new(Arc::new(transport), inbound_rx);
        (dispatcher, inbound_tx, outbound_rx)
    }

    async fn next_outbound(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
        tokio_timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no outbound message")
            .expect("outbound channel closed")
    }

    #[tokio::test]
    async fn test_ping_yields_exactly_one_pong() {
        let (_dispatcher, inbound_tx, mut outbound_rx) = setup();

        inbound_tx
            .send(r#"{"type": "ping", "id": "ping-1", "payload": {}}"#.to_string())
            .unwrap();

        let pong = next_outbound(&mut outbound_rx).await;
        assert_eq!(pong.msg_type, TYPE_RESPONSE);
        assert_eq!(pong.reply_to.as_deref(), Some("ping-1"));
        assert_eq!(pong.payload["result"], json!("pong"));

        assert!(
            tokio_timeout(Duration::from_millis(50), outbound_rx.recv())
                .await
                .is_err(),
            "ping must produce exactly one response"
        );
    }

    #[tokio::test]
    async fn test_send_and_await_matches_by_correlation_id() {
        let (dispatcher, inbound_tx, mut outbound_rx) = setup();

        let echo = tokio::spawn(async move {
            let request = next_outbound(&mut outbound_rx).await;
            let id = request.id.expect("request must carry an id");
            let reply = Envelope::reply_to(
                id,
                TYPE_RESPONSE,
                [("result".to_string(), json!("ok"))].into_iter().collect(),
            );
            inbound_tx.send(reply.to_json().unwrap()).unwrap();
        });

        let reply = dispatcher
            .send_and_await("get_flow", Map::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.payload["result"], json!("ok"));
        assert_eq!(dispatcher.pending_count(), 0);
        echo.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_and_drops_late_reply() {
        let (dispatcher, inbound_tx, mut outbound_rx) = setup();

        let err = dispatcher
            .send_and_await("get_flow", Map::new(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Timeout));
        assert_eq!(dispatcher.pending_count(), 0);

        // Late reply must be a harmless no-op.
        let request = next_outbound(&mut outbound_rx).await;
        let late = Envelope::reply_to(request.id.unwrap(), TYPE_RESPONSE, Map::new());
        inbound_tx.send(late.to_json().unwrap()).unwrap();

        // Dispatcher still serves traffic afterwards.
        inbound_tx
            .send(r#"{"type": "ping", "id": "p", "payload": {}}"#.to_string())
            .unwrap();
        let pong = next_outbound(&mut outbound_rx).await;
        assert_eq!(pong.reply_to.as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn test_channel_teardown_fails_waiters() {
        let (dispatcher, inbound_tx, _outbound_rx) = setup();

        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .send_and_await("get_flow", Map::new(), Duration::from_secs(5))
                    .await
            })
        };

        // Let the request register before tearing the channel down.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(inbound_tx);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(FlowError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped_not_fatal() {
        let (_dispatcher, inbound_tx, mut outbound_rx) = setup();

        inbound_tx.send("not json at all".to_string()).unwrap();
        inbound_tx.send(r#"{"payload": {}}"#.to_string()).unwrap();

        inbound_tx
            .send(r#"{"type": "ping", "id": "after", "payload": {}}"#.to_string())
            .unwrap();
        let pong = next_outbound(&mut outbound_rx).await;
        assert_eq!(pong.reply_to.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_on_message_last_registration_wins() {
        let (dispatcher, inbound_tx, _outbound_rx) = setup();

        let (first_tx, mut first_rx) = mpsc::unbounded_channel::<Envelope>();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel::<Envelope>();

        dispatcher.on_message(
            "navigation",
            Arc::new(move |env| {
                let _ = first_tx.send(env);
            }),
        );
        dispatcher.on_message(
            "navigation",
            Arc::new(move |env| {
                let _ = second_tx.send(env);
            }),
        );

        inbound_tx
            .send(r#"{"type": "navigation", "payload": {"screen": "home"}}"#.to_string())
            .unwrap();

        let seen = tokio_timeout(Duration::from_secs(1), second_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.payload["screen"], json!("home"));
        assert!(
            tokio_timeout(Duration::from_millis(50), first_rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_renderer_request_answered_via_reply() {
        let (dispatcher, inbound_tx, mut outbound_rx) = setup();

        let reply_dispatcher = dispatcher.clone();
        dispatcher.on_message(
            "get_locale",
            Arc::new(move |env| {
                if let Some(id) = env.id {
                    let payload = [("locale".to_string(), json!("en-US"))]
                        .into_iter()
                        .collect();
                    let _ = reply_dispatcher.reply(&id, TYPE_RESPONSE, payload);
                }
            }),
        );

        inbound_tx
            .send(r#"{"type": "get_locale", "id": "loc-1", "payload": {}}"#.to_string())
            .unwrap();

        let reply = next_outbound(&mut outbound_rx).await;
        assert_eq!(reply.reply_to.as_deref(), Some("loc-1"));
        assert_eq!(reply.payload["locale"], json!("en-US"));
    }
}
