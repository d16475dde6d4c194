use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use flowkit_analytics::batch::{BatchEventItem, BatchRequest};
use flowkit_analytics::queue::EventBatchQueue;
use flowkit_bridge::dispatcher::BridgeDispatcher;
use flowkit_bridge::trace::{TraceKind, TraceRecorder};
use flowkit_bridge::transport::RendererTransport;
use flowkit_core::config::SdkConfig;
use flowkit_core::envelope::{Envelope, TYPE_RESPONSE, TYPE_SET_PRODUCTS};
use flowkit_core::error::{FlowError, FlowResult};
use flowkit_core::types::{Campaign, PurchaseOutcome};
use flowkit_journey::tracker::JourneyTracker;
use flowkit_journey::types::JourneyState;
use flowkit_trigger::broker::TriggerBroker;
use flowkit_trigger::types::{TriggerPayload, TriggerUpdate};

/// Host → renderer: present a flow.
pub const MSG_SHOW_FLOW: &str = "show_flow";
/// Renderer → host: a flow became visible.
pub const MSG_FLOW_SHOWN: &str = "flow_shown";
/// Renderer → host: the flow's triggering criterion fired.
pub const MSG_FLOW_COMPLETED: &str = "flow_completed";
/// Renderer → host: the flow was dismissed.
pub const MSG_FLOW_CLOSED: &str = "flow_closed";
/// Renderer → host: arbitrary analytics event.
pub const MSG_TRACK: &str = "track";
/// Renderer → host: purchase request, expects a reply.
pub const MSG_PURCHASE: &str = "purchase";
pub const MSG_NAVIGATION: &str = "navigation";
pub const MSG_BINDING: &str = "binding";

pub type PurchaseHandler = Arc<dyn Fn(&str) -> PurchaseOutcome + Send + Sync>;

/// Product pushed into the renderer via `set_products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
}

/// Links a flow id back to the journey and trigger event it belongs to.
#[derive(Debug, Clone)]
struct FlowBinding {
    journey_id: Uuid,
    event_id: String,
    campaign_id: String,
}

/// The client runtime. One instance per host application.
///
/// All renderer traffic goes through the bridge dispatcher; journey state
/// and tracked events update as flow lifecycle messages arrive, and
/// completion notifications reach the original `trigger` caller through
/// the broker.
#[derive(Clone)]
pub struct FlowKit {
    config: SdkConfig,
    campaigns: Arc<DashMap<String, Campaign>>,
    broker: TriggerBroker,
    dispatcher: BridgeDispatcher,
    tracker: JourneyTracker,
    queue: Arc<EventBatchQueue>,
    flow_bindings: Arc<DashMap<String, FlowBinding>>,
    purchase_handler: Arc<Mutex<Option<PurchaseHandler>>>,
    trace: Arc<TraceRecorder>,
}

impl FlowKit {
    /// Builds the runtime over the given renderer transport and inbound
    /// frame channel, and installs the bridge message handlers.
    pub fn new(
        config: SdkConfig,
        transport: Arc<dyn RendererTransport>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        let queue = Arc::new(EventBatchQueue::new());
        let tracker = JourneyTracker::new().with_event_sink(queue.clone());
        let dispatcher = BridgeDispatcher::new(transport, inbound);

        let client = Self {
            config,
            campaigns: Arc::new(DashMap::new()),
            broker: TriggerBroker::new(),
            dispatcher,
            tracker,
            queue,
            flow_bindings: Arc::new(DashMap::new()),
            purchase_handler: Arc::new(Mutex::new(None)),
            trace: Arc::new(TraceRecorder::new()),
        };
        client.install_handlers();
        client
    }

    pub fn register_campaign(&self, campaign: Campaign) {
        info!(campaign_id = %campaign.id, trigger = %campaign.trigger_event, "Registering campaign");
        self.campaigns.insert(campaign.id.clone(), campaign);
    }

    /// Fires an application event. Resolves the campaign for the trigger,
    /// starts a journey, asks the renderer to present the first flow, and
    /// suspends until the journey reaches a terminal update.
    ///
    /// A flow that fails to present surfaces as an error here; the call
    /// never stays pending indefinitely on presentation failure.
    pub async fn trigger(&self, event: &str) -> FlowResult<TriggerUpdate> {
        let campaign = self
            .campaigns
            .iter()
            .find(|c| c.trigger_event == event)
            .map(|c| c.clone())
            .ok_or_else(|| FlowError::NotFound(format!("no campaign for trigger {event}")))?;

        let first_flow = campaign
            .flow_ids
            .first()
            .cloned()
            .ok_or_else(|| FlowError::NotFound(format!("campaign {} has no flows", campaign.id)))?;

        let journey = self.tracker.start(&campaign, &self.config.distinct_id);
        for flow_id in &campaign.flow_ids {
            self.flow_bindings.insert(
                flow_id.clone(),
                FlowBinding {
                    journey_id: journey.id,
                    event_id: event.to_string(),
                    campaign_id: campaign.id.clone(),
                },
            );
        }

        // Terminal updates resolve the caller; intermediate flow-shown
        // updates are progress only.
        let (done_tx, done_rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(done_tx)));
        self.broker.register(
            event,
            Arc::new(move |update: TriggerUpdate| {
                if matches!(update.payload, TriggerPayload::FlowShown { .. }) {
                    return;
                }
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(update);
                }
            }),
        );

        let mut payload = Map::new();
        payload.insert("campaign_id".to_string(), json!(campaign.id));
        payload.insert("flow_id".to_string(), json!(first_flow));
        payload.insert("event".to_string(), json!(event));

        let timeout = Duration::from_millis(self.config.bridge.reply_timeout_ms);
        let reply = match self
            .dispatcher
            .send_and_await(MSG_SHOW_FLOW, payload, timeout)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                self.broker.complete(event);
                self.unbind_journey(&journey.id);
                return Err(err);
            }
        };

        if let Some(status) = reply.payload.get("status").and_then(Value::as_str) {
            if status != "ok" {
                self.broker.complete(event);
                self.unbind_journey(&journey.id);
                return Err(FlowError::PresentationFailed(status.to_string()));
            }
        }

        // Handler (and its sender) lives until `complete`; an error here
        // means the broker was reset out from under us.
        let update = done_rx.await.map_err(|_| FlowError::ChannelClosed)?;
        self.broker.complete(event);
        Ok(update)
    }

    /// Appends a host-tracked event to the batch queue.
    pub fn track(&self, event: &str, properties: Option<Map<String, Value>>) {
        let mut item = BatchEventItem::new(event, self.config.distinct_id.clone());
        if let Some(properties) = properties {
            item = item.with_properties(properties);
        }
        self.queue.enqueue(item);
    }

    /// Pushes the purchasable product catalog into the renderer.
    pub fn set_products(&self, products: &[Product]) -> FlowResult<()> {
        let mut payload = Map::new();
        payload.insert("products".to_string(), serde_json::to_value(products)?);
        self.dispatcher.send(TYPE_SET_PRODUCTS, payload)
    }

    /// Installs the purchase capability. Renderer `purchase` requests are
    /// answered with the handler's outcome; without a handler they fail.
    pub fn on_purchase(&self, handler: PurchaseHandler) {
        *self.purchase_handler.lock() = Some(handler);
    }

    /// Drains one batch of tracked events for delivery.
    pub fn drain_batch(&self) -> BatchRequest {
        self.queue.drain(self.config.batch.max_batch_size)
    }

    pub fn queue(&self) -> Arc<EventBatchQueue> {
        self.queue.clone()
    }

    pub fn tracker(&self) -> &JourneyTracker {
        &self.tracker
    }

    pub fn trace(&self) -> Arc<TraceRecorder> {
        self.trace.clone()
    }

    /// Clears all trigger handlers. Callers awaiting a trigger see the
    /// channel close. Used for test isolation and full-SDK resets.
    pub fn reset(&self) {
        self.broker.reset();
    }

    fn unbind_journey(&self, journey_id: &Uuid) {
        self.flow_bindings.retain(|_, b| b.journey_id != *journey_id);
    }

    fn install_handlers(&self) {
        let client = self.clone();
        self.dispatcher.on_message(
            MSG_FLOW_SHOWN,
            Arc::new(move |env| client.handle_flow_shown(env)),
        );

        let client = self.clone();
        self.dispatcher.on_message(
            MSG_FLOW_COMPLETED,
            Arc::new(move |env| client.handle_flow_completed(env)),
        );

        let client = self.clone();
        self.dispatcher.on_message(
            MSG_FLOW_CLOSED,
            Arc::new(move |env| client.handle_flow_closed(env)),
        );

        let client = self.clone();
        self.dispatcher
            .on_message(MSG_TRACK, Arc::new(move |env| client.handle_track(env)));

        let client = self.clone();
        self.dispatcher.on_message(
            MSG_PURCHASE,
            Arc::new(move |env| client.handle_purchase(env)),
        );

        let trace = self.trace.clone();
        self.dispatcher.on_message(
            MSG_NAVIGATION,
            Arc::new(move |env| record_trace(&trace, TraceKind::Navigation, &env)),
        );

        let trace = self.trace.clone();
        self.dispatcher.on_message(
            MSG_BINDING,
            Arc::new(move |env| record_trace(&trace, TraceKind::Binding, &env)),
        );
    }

    fn binding_for(&self, env: &Envelope) -> Option<(String, FlowBinding)> {
        let flow_id = env.payload.get("flow_id").and_then(Value::as_str)?;
        let binding = self.flow_bindings.get(flow_id)?.clone();
        Some((flow_id.to_string(), binding))
    }

    fn handle_flow_shown(&self, env: Envelope) {
        let Some((flow_id, binding)) = self.binding_for(&env) else {
            debug!("flow_shown for unknown flow, ignoring");
            return;
        };
        match self.tracker.record_flow_shown(&binding.journey_id, &flow_id) {
            Ok(state) => {
                self.broker.emit(
                    &binding.event_id,
                    TriggerUpdate::flow_shown(&binding.event_id, &flow_id),
                );
                // WorkflowEntry journeys are already converted here; the
                // terminal notification still waits for dismissal.
                debug!(journey_id = %binding.journey_id, ?state, "Flow shown");
            }
            Err(err) => warn!(error = %err, "Failed to record flow_shown"),
        }
    }

    fn handle_flow_completed(&self, env: Envelope) {
        let Some((flow_id, binding)) = self.binding_for(&env) else {
            debug!("flow_completed for unknown flow, ignoring");
            return;
        };
        match self
            .tracker
            .record_flow_completed(&binding.journey_id, &flow_id)
        {
            Ok(JourneyState::Converted) => {
                self.finish_journey(&binding, Some(&flow_id), true);
            }
            Ok(state) => {
                debug!(journey_id = %binding.journey_id, ?state, "Flow completed without conversion");
            }
            Err(err) => warn!(error = %err, "Failed to record flow_completed"),
        }
    }

    fn handle_flow_closed(&self, env: Envelope) {
        let Some((flow_id, binding)) = self.binding_for(&env) else {
            debug!("flow_closed for unknown flow, ignoring");
            return;
        };
        match self.tracker.record_flow_closed(&binding.journey_id) {
            Ok(state) => {
                self.finish_journey(&binding, Some(&flow_id), state == JourneyState::Converted);
            }
            Err(err) => warn!(error = %err, "Failed to record flow_closed"),
        }
    }

    fn finish_journey(&self, binding: &FlowBinding, flow_id: Option<&str>, converted: bool) {
        let mut context = Map::new();
        context.insert("converted".to_string(), json!(converted));
        context.insert("campaign_id".to_string(), json!(binding.campaign_id));
        if let Some(flow_id) = flow_id {
            context.insert("flow_id".to_string(), json!(flow_id));
        }
        self.broker.emit(
            &binding.event_id,
            TriggerUpdate::journey_completed(&binding.event_id, context),
        );
        self.unbind_journey(&binding.journey_id);
    }

    fn handle_track(&self, env: Envelope) {
        let Some(event) = env.payload.get("event").and_then(Value::as_str) else {
            warn!("track message without event name, dropping");
            return;
        };
        let properties = env
            .payload
            .get("properties")
            .and_then(Value::as_object)
            .cloned();
        self.track(event, properties);
    }

    fn handle_purchase(&self, env: Envelope) {
        let Some(request_id) = env.id.clone() else {
            warn!("purchase message without id, cannot reply");
            return;
        };
        let product_id = env
            .payload
            .get("product_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let handler = self.purchase_handler.lock().clone();
        let outcome = match handler {
            Some(handler) => handler(&product_id),
            None => PurchaseOutcome::Failed {
                reason: "no purchase handler installed".to_string(),
            },
        };

        let payload = match serde_json::to_value(&outcome) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Err(err) = self.dispatcher.reply(&request_id, TYPE_RESPONSE, payload) {
            warn!(error = %err, "Failed to reply to purchase request");
        }
    }
}

fn record_trace(trace: &TraceRecorder, kind: TraceKind, env: &Envelope) {
    let field = |key: &str| {
        env.payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    trace.record(
        kind,
        field("name"),
        field("screen_id"),
        field("output"),
        env.payload.get("metadata").cloned(),
    );
}
