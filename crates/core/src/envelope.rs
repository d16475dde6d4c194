//! Message envelope codec — the JSON wire format exchanged between the host
//! and the embedded content renderer.
//!
//! Wire shape: `{"type": string, "id"?: string, "replyTo"?: string,
//! "payload": object}`. `id` is set by the sender when a reply is expected;
//! a response carries the original id in `replyTo`. Payload values stay
//! dynamically typed (`serde_json::Value`) so host and renderer versions can
//! evolve their schemas independently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{FlowError, FlowResult};

/// Built-in message type: liveness/handshake probe.
pub const TYPE_PING: &str = "ping";
/// Built-in message type: reply to a correlated request.
pub const TYPE_RESPONSE: &str = "response";
/// Built-in message type: pushes the product catalog into the renderer.
pub const TYPE_SET_PRODUCTS: &str = "set_products";

/// A single message crossing the host/renderer boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Fire-and-forget message; no correlation id attached.
    pub fn new(msg_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            msg_type: msg_type.into(),
            id: None,
            reply_to: None,
            payload,
        }
    }

    /// Message expecting a reply; generates a fresh correlation id.
    pub fn request(msg_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            msg_type: msg_type.into(),
            id: Some(Uuid::new_v4().to_string()),
            reply_to: None,
            payload,
        }
    }

    /// Response to a previously received request with the given id.
    pub fn reply_to(
        request_id: impl Into<String>,
        msg_type: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            msg_type: msg_type.into(),
            id: None,
            reply_to: Some(request_id.into()),
            payload,
        }
    }

    /// Parses a raw frame. A frame that is not a JSON object, or whose
    /// `type` is missing or empty, is malformed.
    pub fn parse(raw: &str) -> FlowResult<Envelope> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| FlowError::MalformedMessage(format!("{e}: {raw}")))?;
        if envelope.msg_type.is_empty() {
            return Err(FlowError::MalformedMessage(format!(
                "missing message type: {raw}"
            )));
        }
        Ok(envelope)
    }

    pub fn to_json(&self) -> FlowResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
