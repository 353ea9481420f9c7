//! Stream wire format
//!
//! The backend writes `data: <payload>\n` lines separated by blank lines.
//! A payload is a JSON object `{"type": ..., "data": {...}}`, a JSON array of
//! such objects, or one of the end-of-stream sentinels `[DONE]`, `"done"`,
//! `null`.
//!
//! # Module structure
//! - `events` - Event, EventKind, Frame and Sentinel definitions
//! - `decoder` - FrameDecoder turning raw chunks into complete frames
//! - `validator` - structural balance check run before any JSON decoding
//! - `parser` - payload decoding into typed events

mod decoder;
mod events;
mod parser;
pub mod validator;

// Re-export public types
pub use decoder::{classify_line, FrameDecoder, DATA_PREFIX};
pub use events::{Event, EventKind, Frame, Sentinel};
pub use parser::{parse_event, parse_payload};
pub use validator::{is_well_formed, Rejection};
