//! draftwire - incremental streaming-response client
//!
//! Turns a chunked `data:` line stream into ordered, typed events, and keeps
//! the same event contract when the backend can only answer with a single
//! JSON body.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod session;
pub mod sse;
pub mod traits;

pub use config::SessionConfig;
pub use dispatch::EventDispatcher;
pub use error::{StreamError, StreamResult};
pub use session::{SessionOutcome, SessionRegistry, SessionState, StreamSession};
pub use sse::{Event, EventKind};
