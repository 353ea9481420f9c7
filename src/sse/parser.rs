//! Payload decoding into typed events
//!
//! Decoding failures are never fatal: the caller logs them, drops the frame,
//! and keeps the session running.

use serde_json::Value;

use crate::error::{StreamError, StreamResult};
use crate::sse::events::Event;
use crate::sse::validator;

/// Decode a single JSON value into an [`Event`].
fn event_from_value(value: Value) -> StreamResult<Event> {
    if !value.is_object() {
        return Err(StreamError::malformed("event is not a JSON object"));
    }
    serde_json::from_value(value).map_err(StreamError::malformed)
}

/// Validate and decode a payload into zero or more events.
///
/// An object payload yields one event. An array payload is a batch: each
/// element is decoded in order and elements that are not events are dropped
/// with a warning. Fails when the payload itself is not well formed.
pub fn parse_payload(payload: &str) -> StreamResult<Vec<Event>> {
    validator::check(payload).map_err(StreamError::malformed)?;

    let value: Value = serde_json::from_str(payload).map_err(StreamError::malformed)?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match event_from_value(item) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(index, "Dropping batch element: {}", e);
                    None
                }
            })
            .collect()),
        other => event_from_value(other).map(|event| vec![event]),
    }
}

/// Decode a single-event payload, logging and returning `None` on failure.
pub fn parse_event(payload: &str) -> Option<Event> {
    match parse_payload(payload) {
        Ok(mut events) if events.len() == 1 => events.pop(),
        Ok(events) => {
            tracing::warn!(count = events.len(), "Expected one event in payload");
            None
        }
        Err(e) => {
            tracing::warn!("Dropping frame: {}", e);
            None
        }
    }
}
