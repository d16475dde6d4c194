//! Wire model for the batch ingestion endpoint.
//!
//! Every optional field is omitted (not null) from the serialized form when
//! unset, to keep payloads small. `event` and `distinct_id` are always
//! present and non-empty.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tracked event inside a batch request. Snake_case wire keys, with the
/// identity-merge field renamed to `$anon_distinct_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEventItem {
    pub event: String,
    pub distinct_id: String,
    #[serde(rename = "$anon_distinct_id", skip_serializing_if = "Option::is_none")]
    pub anon_distinct_id: Option<String>,
    /// ISO-8601. Absent means "now" at ingestion — the queue never fills
    /// this in, so "unknown" stays distinguishable from "now".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Dedupe token honored by the network layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl BatchEventItem {
    pub fn new(event: impl Into<String>, distinct_id: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            distinct_id: distinct_id.into(),
            anon_distinct_id: None,
            timestamp: None,
            properties: None,
            idempotency_key: None,
            value: None,
            entity_id: None,
        }
    }

    pub fn with_anon_distinct_id(mut self, anon: impl Into<String>) -> Self {
        self.anon_distinct_id = Some(anon.into());
        self
    }

    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at.to_rfc3339_opts(SecondsFormat::Millis, true));
        self
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// An ordered batch of events bound for one network call.
/// `historical_migration` appears on the wire only when true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch: Vec<BatchEventItem>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub historical_migration: bool,
}

impl BatchRequest {
    pub fn new(batch: Vec<BatchEventItem>) -> Self {
        Self {
            batch,
            historical_migration: false,
        }
    }

    pub fn historical(batch: Vec<BatchEventItem>) -> Self {
        Self {
            batch,
            historical_migration: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_item_serializes_two_fields_only() {
        let item = BatchEventItem::new("$flow_shown", "user-1");
        let raw = serde_json::to_value(&item).unwrap();
        assert_eq!(
            raw,
            json!({"event": "$flow_shown", "distinct_id": "user-1"})
        );
    }

    #[test]
    fn test_full_item_wire_keys() {
        let item = BatchEventItem::new("purchase", "user-1")
            .with_anon_distinct_id("anon-9")
            .with_timestamp("2026-08-31T12:00:00Z".parse().unwrap())
            .with_properties([("plan".to_string(), json!("monthly"))].into_iter().collect())
            .with_idempotency_key("idem-1")
            .with_value(9.99)
            .with_entity_id("product-1");

        let raw = serde_json::to_string(&item).unwrap();
        assert!(raw.contains("\"$anon_distinct_id\":\"anon-9\""));
        assert!(raw.contains("\"idempotency_key\":\"idem-1\""));
        assert!(raw.contains("\"timestamp\":\"2026-08-31T12:00:00.000Z\""));
        assert!(raw.contains("\"entity_id\":\"product-1\""));

        let parsed: BatchEventItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_historical_migration_omitted_when_false() {
        let request = BatchRequest::new(vec![BatchEventItem::new("e", "u")]);
        let raw = serde_json::to_string(&request).unwrap();
        assert!(!raw.contains("historical_migration"));
    }

    #[test]
    fn test_historical_migration_present_when_true() {
        let request = BatchRequest::historical(vec![BatchEventItem::new("e", "u")]);
        let raw = serde_json::to_string(&request).unwrap();
        assert!(raw.contains("\"historical_migration\":true"));
    }

    #[test]
    fn test_deserialize_defaults_flag_to_false() {
        let request: BatchRequest =
            serde_json::from_str(r#"{"batch": []}"#).unwrap();
        assert!(!request.historical_migration);
    }
}
