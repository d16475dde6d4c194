use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flowkit_core::types::{Campaign, ConversionAnchor};

/// Lifecycle state of a journey. `Converted` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyState {
    Created,
    Shown,
    Converted,
    Abandoned,
}

impl JourneyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JourneyState::Converted | JourneyState::Abandoned)
    }
}

/// Per-customer-per-campaign record. Holds the campaign *id*, never the
/// campaign itself — campaigns and journeys have independent lifecycles.
///
/// Journeys are persisted and rehydrated across process restarts, so every
/// field must survive a serialize/deserialize round trip exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: Uuid,
    pub campaign_id: String,
    pub distinct_id: String,
    /// Copied from the campaign at creation time. Invalid raw anchor values
    /// have already degraded to `WorkflowEntry` by this point.
    pub conversion_anchor: ConversionAnchor,
    pub created_at: DateTime<Utc>,
    pub state: JourneyState,
    /// Most recently shown flow; what `LastFlowShown` converts against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_flow_shown: Option<String>,
}

impl Journey {
    pub fn new(campaign: &Campaign, distinct_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: campaign.id.clone(),
            distinct_id: distinct_id.into(),
            conversion_anchor: campaign.conversion_anchor,
            created_at: Utc::now(),
            state: JourneyState::Created,
            last_flow_shown: None,
        }
    }
}
