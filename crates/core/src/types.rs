//! Shared domain types — campaigns, conversion anchors, purchase outcomes.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The rule determining the moment a journey counts as converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionAnchor {
    /// Converts as soon as the workflow is entered.
    WorkflowEntry,
    /// Converts only when the final flow of a multi-flow campaign is the one
    /// the triggering criterion is evaluated against.
    LastFlowShown,
}

impl ConversionAnchor {
    /// Parses a raw anchor string. Unrecognized values silently degrade to
    /// `WorkflowEntry` — campaigns authored against a newer SDK must never
    /// fail to load on an older one.
    pub fn parse(raw: &str) -> ConversionAnchor {
        match raw {
            "workflow_entry" => ConversionAnchor::WorkflowEntry,
            "last_flow_shown" => ConversionAnchor::LastFlowShown,
            other => {
                warn!(raw = %other, "Unknown conversion anchor, defaulting to workflow_entry");
                ConversionAnchor::WorkflowEntry
            }
        }
    }
}

impl Default for ConversionAnchor {
    fn default() -> Self {
        ConversionAnchor::WorkflowEntry
    }
}

/// Immutable campaign definition. Journeys reference campaigns by id only;
/// the two have independent lifecycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    /// Application event name that triggers this campaign.
    pub trigger_event: String,
    /// Flows shown in sequence; the last one matters for `LastFlowShown`.
    pub flow_ids: Vec<String>,
    pub conversion_anchor: ConversionAnchor,
}

impl Campaign {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        trigger_event: impl Into<String>,
        flow_ids: Vec<String>,
        raw_anchor: &str,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trigger_event: trigger_event.into(),
            flow_ids,
            conversion_anchor: ConversionAnchor::parse(raw_anchor),
        }
    }
}

/// Outcome of a purchase attempt surfaced through the renderer.
/// `Cancelled` and `Pending` are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PurchaseOutcome {
    Purchased,
    Cancelled,
    Pending,
    Failed { reason: String },
}
