//! Runtime trace fixtures — a diagnostic contract recording the observable
//! outputs of a rendered flow (navigation, binding callbacks, events) so
//! different renderer backends can be asserted to behave identically.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TRACE_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Navigation,
    Binding,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub step: u32,
    pub kind: TraceKind,
    pub name: String,
    pub screen_id: String,
    pub output: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTraceFixture {
    pub schema_version: i32,
    pub fixture_id: String,
    pub renderer_backend: String,
    pub entries: Vec<TraceEntry>,
}

impl RuntimeTraceFixture {
    /// Entries must be ordered by `step` for fixture comparison to be
    /// meaningful.
    pub fn is_ordered(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].step < w[1].step)
    }
}

/// Collects trace entries with monotonically assigned steps.
#[derive(Default)]
pub struct TraceRecorder {
    inner: Mutex<RecorderState>,
}

#[derive(Default)]
struct RecorderState {
    next_step: u32,
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        kind: TraceKind,
        name: impl Into<String>,
        screen_id: impl Into<String>,
        output: impl Into<String>,
        metadata: Option<Value>,
    ) {
        let mut state = self.inner.lock();
        let step = state.next_step;
        state.next_step += 1;
        state.entries.push(TraceEntry {
            step,
            kind,
            name: name.into(),
            screen_id: screen_id.into(),
            output: output.into(),
            metadata,
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Snapshots the recorded entries into a fixture for the given backend.
    pub fn finish(
        &self,
        fixture_id: impl Into<String>,
        renderer_backend: impl Into<String>,
    ) -> RuntimeTraceFixture {
        RuntimeTraceFixture {
            schema_version: TRACE_SCHEMA_VERSION,
            fixture_id: fixture_id.into(),
            renderer_backend: renderer_backend.into(),
            entries: self.inner.lock().entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recorder_assigns_ordered_steps() {
        let recorder = TraceRecorder::new();
        recorder.record(TraceKind::Navigation, "push", "home", "paywall", None);
        recorder.record(
            TraceKind::Binding,
            "price_label",
            "paywall",
            "$9.99",
            Some(json!({"product": "monthly"})),
        );
        recorder.record(TraceKind::Event, "cta_tapped", "paywall", "purchase", None);

        let fixture = recorder.finish("fixture-001", "loopback");
        assert_eq!(fixture.schema_version, TRACE_SCHEMA_VERSION);
        assert_eq!(fixture.entries.len(), 3);
        assert!(fixture.is_ordered());
        assert_eq!(fixture.entries[2].step, 2);
    }

    #[test]
    fn test_wire_keys_are_camel_case() {
        let fixture = RuntimeTraceFixture {
            schema_version: TRACE_SCHEMA_VERSION,
            fixture_id: "f".into(),
            renderer_backend: "webview".into(),
            entries: vec![TraceEntry {
                step: 0,
                kind: TraceKind::Navigation,
                name: "push".into(),
                screen_id: "home".into(),
                output: "paywall".into(),
                metadata: None,
            }],
        };

        let raw = serde_json::to_string(&fixture).unwrap();
        assert!(raw.contains("\"schemaVersion\":1"));
        assert!(raw.contains("\"fixtureId\""));
        assert!(raw.contains("\"rendererBackend\""));
        assert!(raw.contains("\"screenId\""));
        assert!(raw.contains("\"kind\":\"navigation\""));

        let parsed: RuntimeTraceFixture = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, fixture);
    }

    #[test]
    fn test_out_of_order_detected() {
        let mut fixture = RuntimeTraceFixture {
            schema_version: TRACE_SCHEMA_VERSION,
            fixture_id: "f".into(),
            renderer_backend: "webview".into(),
            entries: vec![],
        };
        assert!(fixture.is_ordered());

        for step in [1u32, 0] {
            fixture.entries.push(TraceEntry {
                step,
                kind: TraceKind::Event,
                name: "e".into(),
                screen_id: "s".into(),
                output: "o".into(),
                metadata: None,
            });
        }
        assert!(!fixture.is_ordered());
    }
}
