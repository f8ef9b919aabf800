//! Builders for envelopes and SSE payloads.

use hookrelay_core::RawEvent;
use serde_json::{Map, Value};

/// Builds a message envelope: `headers` become top-level keys next to
/// `body`.
pub fn envelope(headers: &[(&str, Value)], body: Value) -> String {
    let mut object = Map::new();
    for (name, value) in headers {
        object.insert((*name).to_string(), value.clone());
    }
    object.insert("body".to_string(), body);
    Value::Object(object).to_string()
}

/// A `message` frame carrying the given envelope.
pub fn message_event(id: impl Into<String>, headers: &[(&str, Value)], body: Value) -> RawEvent {
    RawEvent::message(id, envelope(headers, body))
}

/// Renders frames as an SSE response body.
pub fn sse_body(events: &[RawEvent]) -> String {
    events.iter().map(|event| format!("{}\n", event.dump())).collect()
}
