//! Tracks live journeys and decides conversion attribution.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use flowkit_analytics::batch::BatchEventItem;
use flowkit_analytics::sink::EventSink;
use flowkit_core::error::{FlowError, FlowResult};
use flowkit_core::types::{Campaign, ConversionAnchor};

use crate::state_machine::JourneyStateMachine;
use crate::types::{Journey, JourneyState};

pub const EVENT_JOURNEY_ENTERED: &str = "$journey_entered";
pub const EVENT_FLOW_SHOWN: &str = "$flow_shown";
pub const EVENT_JOURNEY_CONVERTED: &str = "$journey_converted";
pub const EVENT_JOURNEY_ABANDONED: &str = "$journey_abandoned";

/// Registry of in-flight journeys. Campaigns are referenced by id only;
/// the owning campaign registry lives with the SDK facade.
#[derive(Clone)]
pub struct JourneyTracker {
    journeys: Arc<DashMap<Uuid, Journey>>,
    event_sink: Arc<dyn EventSink>,
}

impl JourneyTracker {
    pub fn new() -> Self {
        Self {
            journeys: Arc::new(DashMap::new()),
            event_sink: flowkit_analytics::sink::noop_sink(),
        }
    }

    /// Attach an event sink for emitting journey lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Creates a journey for the customer; the conversion anchor is fixed
    /// here, copied from the campaign definition.
    pub fn start(&self, campaign: &Campaign, distinct_id: &str) -> Journey {
        let journey = Journey::new(campaign, distinct_id);
        info!(
            journey_id = %journey.id,
            campaign_id = %campaign.id,
            distinct_id = %distinct_id,
            anchor = ?journey.conversion_anchor,
            "Journey started"
        );

        self.track(&journey, EVENT_JOURNEY_ENTERED, None);
        self.journeys.insert(journey.id, journey.clone());
        journey
    }

    /// A flow of this journey's campaign became visible. `WorkflowEntry`
    /// journeys convert right here — entering the workflow is the anchor.
    /// Later flows of a multi-flow campaign only update `last_flow_shown`;
    /// shows arriving after a terminal state are ignored.
    pub fn record_flow_shown(&self, journey_id: &Uuid, flow_id: &str) -> FlowResult<JourneyState> {
        let mut journey = self.get_mut(journey_id)?;

        if journey.state.is_terminal() {
            return Ok(journey.state);
        }

        if journey.state == JourneyState::Created {
            let mut machine = JourneyStateMachine::at(journey.state);
            machine.transition(JourneyState::Shown)?;
            journey.state = machine.state;
        }
        journey.last_flow_shown = Some(flow_id.to_string());
        self.track(&journey, EVENT_FLOW_SHOWN, Some(flow_id));

        if journey.conversion_anchor == ConversionAnchor::WorkflowEntry {
            let mut machine = JourneyStateMachine::at(journey.state);
            machine.transition(JourneyState::Converted)?;
            journey.state = machine.state;
            info!(journey_id = %journey.id, flow_id = %flow_id, "Journey converted on workflow entry");
            self.track(&journey, EVENT_JOURNEY_CONVERTED, Some(flow_id));
        }

        Ok(journey.state)
    }

    /// The triggering criterion fired for `flow_id`. `LastFlowShown`
    /// journeys convert only when this is the most recently shown flow of
    /// the campaign; completing an earlier flow in the sequence is not a
    /// conversion.
    pub fn record_flow_completed(
        &self,
        journey_id: &Uuid,
        flow_id: &str,
    ) -> FlowResult<JourneyState> {
        let mut journey = self.get_mut(journey_id)?;

        if journey.conversion_anchor == ConversionAnchor::LastFlowShown
            && journey.state == JourneyState::Shown
            && journey.last_flow_shown.as_deref() == Some(flow_id)
        {
            let mut machine = JourneyStateMachine::at(journey.state);
            machine.transition(JourneyState::Converted)?;
            journey.state = machine.state;
            info!(journey_id = %journey.id, flow_id = %flow_id, "Journey converted on last flow");
            self.track(&journey, EVENT_JOURNEY_CONVERTED, Some(flow_id));
        }

        Ok(journey.state)
    }

    /// The flow was dismissed. A journey still in `Shown` without a
    /// satisfied anchor becomes `Abandoned`; terminal journeys are left
    /// untouched.
    pub fn record_flow_closed(&self, journey_id: &Uuid) -> FlowResult<JourneyState> {
        let mut journey = self.get_mut(journey_id)?;

        if journey.state == JourneyState::Shown {
            let mut machine = JourneyStateMachine::at(journey.state);
            machine.transition(JourneyState::Abandoned)?;
            journey.state = machine.state;
            info!(journey_id = %journey.id, "Journey abandoned");
            self.track(&journey, EVENT_JOURNEY_ABANDONED, None);
        }

        Ok(journey.state)
    }

    pub fn get(&self, journey_id: &Uuid) -> Option<Journey> {
        self.journeys.get(journey_id).map(|r| r.clone())
    }

    pub fn active_count(&self) -> usize {
        self.journeys
            .iter()
            .filter(|r| !r.value().state.is_terminal())
            .count()
    }

    fn get_mut(
        &self,
        journey_id: &Uuid,
    ) -> FlowResult<dashmap::mapref::one::RefMut<'_, Uuid, Journey>> {
        self.journeys
            .get_mut(journey_id)
            .ok_or_else(|| FlowError::NotFound(format!("journey {journey_id}")))
    }

    fn track(&self, journey: &Journey, event: &str, flow_id: Option<&str>) {
        let mut properties = serde_json::Map::new();
        properties.insert("campaign_id".to_string(), json!(journey.campaign_id));
        if let Some(flow_id) = flow_id {
            properties.insert("flow_id".to_string(), json!(flow_id));
        }
        self.event_sink.emit(
            BatchEventItem::new(event, journey.distinct_id.clone())
                .with_entity_id(journey.id.to_string())
                .with_timestamp(Utc::now())
                .with_properties(properties),
        );
    }
}

impl Default for JourneyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_analytics::sink::capture_sink;

    fn campaign(raw_anchor: &str, flows: &[&str]) -> Campaign {
        Campaign::new(
            "camp-1",
            "Onboarding",
            "app_opened",
            flows.iter().map(|f| f.to_string()).collect(),
            raw_anchor,
        )
    }

    #[test]
    fn test_workflow_entry_converts_on_shown() {
        let sink = capture_sink();
        let tracker = JourneyTracker::new().with_event_sink(sink.clone());
        let journey = tracker.start(&campaign("workflow_entry", &["flow-a"]), "user-1");

        let state = tracker.record_flow_shown(&journey.id, "flow-a").unwrap();
        assert_eq!(state, JourneyState::Converted);
        assert_eq!(sink.count_event(EVENT_JOURNEY_CONVERTED), 1);
    }

    #[test]
    fn test_last_flow_shown_converts_on_completed_last_flow() {
        let tracker = JourneyTracker::new();
        let journey = tracker.start(&campaign("last_flow_shown", &["flow-a"]), "user-1");

        tracker.record_flow_shown(&journey.id, "flow-a").unwrap();
        let state = tracker.record_flow_completed(&journey.id, "flow-a").unwrap();
        assert_eq!(state, JourneyState::Converted);
    }

    #[test]
    fn test_last_flow_shown_multi_flow_campaign() {
        let tracker = JourneyTracker::new();
        let journey = tracker.start(&campaign("last_flow_shown", &["flow-a", "flow-b"]), "user-1");

        tracker.record_flow_shown(&journey.id, "flow-a").unwrap();
        tracker.record_flow_shown(&journey.id, "flow-b").unwrap();
        let record = tracker.get(&journey.id).unwrap();
        assert_eq!(record.last_flow_shown.as_deref(), Some("flow-b"));

        // Completing anything but the most recently shown flow must not
        // convert.
        let state = tracker.record_flow_completed(&journey.id, "flow-a").unwrap();
        assert_eq!(state, JourneyState::Shown);

        let state = tracker.record_flow_completed(&journey.id, "flow-b").unwrap();
        assert_eq!(state, JourneyState::Converted);
    }

    #[test]
    fn test_dismissal_without_anchor_abandons() {
        let sink = capture_sink();
        let tracker = JourneyTracker::new().with_event_sink(sink.clone());
        let journey = tracker.start(&campaign("last_flow_shown", &["flow-a"]), "user-1");

        tracker.record_flow_shown(&journey.id, "flow-a").unwrap();
        let state = tracker.record_flow_closed(&journey.id).unwrap();
        assert_eq!(state, JourneyState::Abandoned);
        assert_eq!(sink.count_event(EVENT_JOURNEY_ABANDONED), 1);
    }

    #[test]
    fn test_close_after_conversion_keeps_converted() {
        let tracker = JourneyTracker::new();
        let journey = tracker.start(&campaign("workflow_entry", &["flow-a"]), "user-1");

        tracker.record_flow_shown(&journey.id, "flow-a").unwrap();
        let state = tracker.record_flow_closed(&journey.id).unwrap();
        assert_eq!(state, JourneyState::Converted);
    }

    #[test]
    fn test_unknown_journey_is_not_found() {
        let tracker = JourneyTracker::new();
        let err = tracker.record_flow_closed(&Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, FlowError::NotFound(_)));
    }

    #[test]
    fn test_lifecycle_events_reach_sink() {
        let sink = capture_sink();
        let tracker = JourneyTracker::new().with_event_sink(sink.clone());
        let journey = tracker.start(&campaign("workflow_entry", &["flow-a"]), "user-1");
        tracker.record_flow_shown(&journey.id, "flow-a").unwrap();

        assert_eq!(sink.count_event(EVENT_JOURNEY_ENTERED), 1);
        assert_eq!(sink.count_event(EVENT_FLOW_SHOWN), 1);
        let events = sink.events();
        assert!(events.iter().all(|e| e.distinct_id == "user-1"));
    }
}
