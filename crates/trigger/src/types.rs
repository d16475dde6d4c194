use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Notification delivered to the caller that registered a handler for the
/// matching event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerUpdate {
    pub event_id: String,
    pub payload: TriggerPayload,
}

/// What happened as a result of the trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TriggerPayload {
    FlowShown {
        flow_id: String,
    },
    JourneyCompleted {
        /// Arbitrary context captured at completion (conversion state,
        /// screen ids, purchase info).
        context: Map<String, Value>,
    },
    NoAction,
}

impl TriggerUpdate {
    pub fn flow_shown(event_id: impl Into<String>, flow_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            payload: TriggerPayload::FlowShown {
                flow_id: flow_id.into(),
            },
        }
    }

    pub fn journey_completed(event_id: impl Into<String>, context: Map<String, Value>) -> Self {
        Self {
            event_id: event_id.into(),
            payload: TriggerPayload::JourneyCompleted { context },
        }
    }

    pub fn no_action(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            payload: TriggerPayload::NoAction,
        }
    }
}
