//! Event and frame type definitions
//!
//! Contains the [`Event`] delivered to collaborators, the [`EventKind`]
//! taxonomy, and the [`Frame`] produced by the line decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Known event types emitted by the streaming backend.
///
/// Anything else is carried through as [`EventKind::Other`] and routed to the
/// default handler instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Started,
    Searching,
    SearchResult,
    Analyzing,
    FieldProposal,
    Synthesizing,
    DraftResponse,
    Progress,
    StageComplete,
    OverallProgress,
    Complete,
    Error,
    Token,
    Text,
    /// Unrecognised type name, kept verbatim
    Other(String),
}

impl EventKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Started => "started",
            EventKind::Searching => "searching",
            EventKind::SearchResult => "search_result",
            EventKind::Analyzing => "analyzing",
            EventKind::FieldProposal => "field_proposal",
            EventKind::Synthesizing => "synthesizing",
            EventKind::DraftResponse => "draft_response",
            EventKind::Progress => "progress",
            EventKind::StageComplete => "stage_complete",
            EventKind::OverallProgress => "overall_progress",
            EventKind::Complete => "complete",
            EventKind::Error => "error",
            EventKind::Token => "token",
            EventKind::Text => "text",
            EventKind::Other(name) => name,
        }
    }

    /// `complete` and `error` end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete | EventKind::Error)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "started" => EventKind::Started,
            "searching" => EventKind::Searching,
            "search_result" => EventKind::SearchResult,
            "analyzing" => EventKind::Analyzing,
            "field_proposal" => EventKind::FieldProposal,
            "synthesizing" => EventKind::Synthesizing,
            "draft_response" => EventKind::DraftResponse,
            "progress" => EventKind::Progress,
            "stage_complete" => EventKind::StageComplete,
            "overall_progress" => EventKind::OverallProgress,
            "complete" => EventKind::Complete,
            "error" => EventKind::Error,
            "token" => EventKind::Token,
            "text" => EventKind::Text,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::from(name.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed event delivered to collaborators.
///
/// Wire shape: `{"type": "<kind>", "data": { ... }}`. A missing `data`
/// field decodes as an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Event {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Event with an empty `{}` payload.
    pub fn empty(kind: EventKind) -> Self {
        Self::new(kind, empty_object())
    }

    /// Terminal `error` event carrying a message and an error code.
    pub fn error(message: impl Into<String>, code: &str) -> Self {
        Self::new(
            EventKind::Error,
            serde_json::json!({ "message": message.into(), "code": code }),
        )
    }

    /// Returns the event type name as a string for logging and routing.
    pub fn event_type(&self) -> &str {
        self.kind.as_str()
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// Literal payloads that mark the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// `[DONE]`
    Done,
    /// `"done"` (a JSON string)
    QuotedDone,
    /// `null`
    Null,
}

impl Sentinel {
    /// Recognise a trimmed payload as a sentinel.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "[DONE]" => Some(Sentinel::Done),
            "\"done\"" => Some(Sentinel::QuotedDone),
            "null" => Some(Sentinel::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::Done => "[DONE]",
            Sentinel::QuotedDone => "\"done\"",
            Sentinel::Null => "null",
        }
    }
}

/// One decoded `data:` line.
///
/// Blank lines and lines without the `data:` prefix never become frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Candidate JSON payload, trimmed
    Payload(String),
    /// End-of-stream marker
    Sentinel(Sentinel),
}

impl Frame {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Frame::Sentinel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trips_known_names() {
        for name in [
            "started",
            "searching",
            "search_result",
            "analyzing",
            "field_proposal",
            "synthesizing",
            "draft_response",
            "progress",
            "stage_complete",
            "overall_progress",
            "complete",
            "error",
            "token",
            "text",
        ] {
            let kind = EventKind::from(name);
            assert!(kind.is_known(), "{} should be known", name);
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_kind_is_kept_verbatim() {
        let kind = EventKind::from("ticket_locked");
        assert_eq!(kind, EventKind::Other("ticket_locked".to_string()));
        assert_eq!(kind.to_string(), "ticket_locked");
        assert!(!kind.is_terminal());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(EventKind::Complete.is_terminal());
        assert!(EventKind::Error.is_terminal());
        assert!(!EventKind::Progress.is_terminal());
        assert!(!EventKind::StageComplete.is_terminal());
    }

    #[test]
    fn test_event_deserialize_defaults_data() {
        let event: Event = serde_json::from_str(r#"{"type":"started"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Started);
        assert_eq!(event.data, serde_json::json!({}));
    }

    #[test]
    fn test_event_serialize_uses_wire_names() {
        let event = Event::new(EventKind::FieldProposal, serde_json::json!({"field": "priority"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "field_proposal");
        assert_eq!(json["data"]["field"], "priority");
    }

    #[test]
    fn test_error_event_shape() {
        let event = Event::error("boom", "E_STREAM_TRANSPORT");
        assert!(event.is_terminal());
        assert_eq!(event.data["message"], "boom");
        assert_eq!(event.data["code"], "E_STREAM_TRANSPORT");
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(Sentinel::from_payload("[DONE]"), Some(Sentinel::Done));
        assert_eq!(Sentinel::from_payload("\"done\""), Some(Sentinel::QuotedDone));
        assert_eq!(Sentinel::from_payload("null"), Some(Sentinel::Null));
        assert_eq!(Sentinel::from_payload("done"), None);
        assert_eq!(Sentinel::from_payload("{}"), None);
    }
}
