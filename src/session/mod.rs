//! Streaming session orchestration.
//!
//! A [`StreamSession`] drives one outbound request from open to a terminal
//! state:
//!
//! ```text
//! INIT -> OPENING -> STREAMING -> COMPLETED | ERRORED
//!            |
//!            +-> FALLBACK -> COMPLETED | ERRORED      (no byte ever received)
//!
//! any state -> CANCELLED                               (external cancel)
//! ```
//!
//! Collaborators see exactly one terminal event (`complete` or `error`) per
//! session unless the session is cancelled, in which case no further events
//! are delivered at all. The response body is owned by [`StreamSession::run`]
//! and dropped on every exit path.
//!
//! # Module structure
//! - `fallback` - SimulatedProgressSession replaying stages for a single JSON body
//! - `registry` - SessionRegistry enforcing one live session per request key

mod fallback;
mod registry;

pub use fallback::SimulatedProgressSession;
pub use registry::{SessionHandle, SessionRegistry};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::SessionConfig;
use crate::dispatch::EventDispatcher;
use crate::error::{StreamError, TimeoutPhase};
use crate::sse::{parse_payload, Event, EventKind, Frame, FrameDecoder};
use crate::traits::{HttpClient, HttpError, TransportRequest};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Opening,
    Streaming,
    Fallback,
    Completed,
    Errored,
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::Opening => "opening",
            SessionState::Streaming => "streaming",
            SessionState::Fallback => "fallback",
            SessionState::Completed => "completed",
            SessionState::Errored => "errored",
            SessionState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Cancelled
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary returned when a session ends.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub state: SessionState,
    /// Events delivered to handlers, synthesized ones included
    pub events_dispatched: u64,
    /// Frames dropped as malformed
    pub frames_dropped: u64,
    /// Body bytes received on the streaming request
    pub bytes_received: u64,
    pub used_fallback: bool,
    /// The failure behind an ERRORED outcome
    pub error: Option<StreamError>,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Completed
    }
}

/// What the frame loop should do after a batch of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    EndOfStream,
    Stop,
}

/// One streaming request, end to end.
///
/// Built once per request and consumed by [`run`](Self::run); a session is
/// never reused.
pub struct StreamSession {
    id: String,
    key: Option<String>,
    client: Arc<dyn HttpClient>,
    request: TransportRequest,
    config: SessionConfig,
    dispatcher: EventDispatcher,
    cancel: CancellationToken,
    state: SessionState,
    terminal_delivered: bool,
    last_result: Option<Value>,
    frames_dropped: u64,
    bytes_received: u64,
    used_fallback: bool,
    error: Option<StreamError>,
}

impl StreamSession {
    pub fn new(client: Arc<dyn HttpClient>, request: TransportRequest) -> Self {
        let cancel = CancellationToken::new();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: None,
            client,
            request,
            config: SessionConfig::default(),
            dispatcher: EventDispatcher::new(cancel.clone()),
            cancel,
            state: SessionState::Init,
            terminal_delivered: false,
            last_result: None,
            frames_dropped: 0,
            bytes_received: 0,
            used_fallback: false,
            error: None,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Logical request key (e.g. a ticket id) used for logging and registry.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Register a handler for one event type.
    pub fn on<F>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.dispatcher.on(event_type, handler);
        self
    }

    /// Register a handler for a known kind.
    pub fn on_kind<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.dispatcher.on_kind(kind, handler);
        self
    }

    /// Register an observer for every event.
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.dispatcher.on_any(handler);
        self
    }

    /// Register the handler for types nobody subscribed to.
    pub fn on_unhandled<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.dispatcher.on_unhandled(handler);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token that cancels this session when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the session to a terminal state.
    pub async fn run(mut self) -> SessionOutcome {
        let span = tracing::info_span!(
            "stream_session",
            session_id = %self.id,
            key = self.key.as_deref().unwrap_or("-"),
        );
        async move {
            self.drive().await;
            tracing::info!(
                state = %self.state,
                events = self.dispatcher.delivered_count(),
                dropped = self.frames_dropped,
                bytes = self.bytes_received,
                fallback = self.used_fallback,
                "Session finished"
            );
            self.outcome()
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) {
        let cancel = self.cancel.clone();
        let client = Arc::clone(&self.client);

        self.transition(SessionState::Opening);
        let request = self.request.streaming(&self.config.stream_flag);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(),
            result = timed(self.config.open_timeout, TimeoutPhase::Opening, client.send_stream(&request)) => result,
        };

        let response = match opened {
            Ok(Ok(response)) if response.is_success() => response,
            Ok(Ok(response)) => {
                let err = HttpError::ServerError {
                    status: response.status,
                    message: "streaming request rejected".to_string(),
                };
                return self.pre_stream_failure(err.into()).await;
            }
            Ok(Err(err)) => return self.pre_stream_failure(err.into()).await,
            Err(err) => return self.pre_stream_failure(err).await,
        };

        let mut body = response.body;
        let mut decoder = FrameDecoder::new();

        loop {
            let (deadline, phase) = match self.state {
                SessionState::Opening => (self.config.open_timeout, TimeoutPhase::Opening),
                _ => (self.config.chunk_timeout, TimeoutPhase::Streaming),
            };

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(),
                next = timed(deadline, phase, body.next()) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(err))) => return self.transport_failure(err.into()).await,
                Err(err) => return self.transport_failure(err).await,
                Ok(None) => {
                    if self.state == SessionState::Opening {
                        let err = HttpError::Other("stream closed before any data".to_string());
                        return self.pre_stream_failure(err.into()).await;
                    }
                    tracing::debug!("Transport end-of-data");
                    let frames = decoder.finish();
                    if self.process_frames(frames) == Flow::Stop {
                        return self.settle();
                    }
                    return self.finish_stream().await;
                }
            };

            if chunk.is_empty() {
                continue;
            }
            if self.state == SessionState::Opening {
                self.transition(SessionState::Streaming);
            }
            self.bytes_received += chunk.len() as u64;

            let frames = decoder.append_chunk(&chunk);
            match self.process_frames(frames) {
                Flow::Continue => {
                    self.dispatcher.tick().await;
                    if self.dispatcher.is_cancelled() {
                        return self.cancelled();
                    }
                }
                Flow::EndOfStream => return self.finish_stream().await,
                Flow::Stop => return self.settle(),
            }
        }
    }

    /// Validate, parse and dispatch decoded frames in order.
    fn process_frames(&mut self, frames: Vec<Frame>) -> Flow {
        for frame in frames {
            match frame {
                Frame::Sentinel(sentinel) => {
                    tracing::debug!(sentinel = sentinel.as_str(), "End-of-stream sentinel");
                    return Flow::EndOfStream;
                }
                Frame::Payload(payload) => match parse_payload(&payload) {
                    Ok(events) => {
                        for event in events {
                            if self.deliver(event) == Flow::Stop {
                                return Flow::Stop;
                            }
                        }
                    }
                    Err(err) => {
                        self.frames_dropped += 1;
                        tracing::warn!(
                            code = err.error_code(),
                            len = payload.len(),
                            "Dropping frame: {}",
                            err
                        );
                    }
                },
            }
        }
        Flow::Continue
    }

    fn deliver(&mut self, event: Event) -> Flow {
        tracing::debug!(event_type = event.event_type(), "Event decoded");

        if event.is_terminal() {
            if self.terminal_delivered {
                tracing::warn!(
                    event_type = event.event_type(),
                    "Dropping duplicate terminal event"
                );
                return Flow::Continue;
            }
            self.terminal_delivered = true;

            if event.kind == EventKind::Error {
                let message = event
                    .data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                self.dispatcher.dispatch(event);
                self.dispatcher.flush();
                if self.dispatcher.is_cancelled() {
                    self.cancelled();
                    return Flow::Stop;
                }
                tracing::error!(message = %message, "Backend reported error");
                self.error = Some(StreamError::Backend { message });
                self.transition(SessionState::Errored);
                return Flow::Stop;
            }
            self.last_result = Some(event.data.clone());
        } else if event.kind == EventKind::DraftResponse {
            self.last_result = Some(event.data.clone());
        }

        if self.dispatcher.dispatch(event) {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }

    /// Sentinel or end-of-data: make sure exactly one `complete` went out.
    async fn finish_stream(&mut self) {
        if !self.terminal_delivered {
            let data = self
                .last_result
                .take()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            tracing::debug!("Synthesizing complete event");
            self.terminal_delivered = true;
            self.dispatcher.dispatch(Event::new(EventKind::Complete, data));
        }
        self.dispatcher.tick().await;

        if self.dispatcher.is_cancelled() {
            self.cancelled();
        } else {
            self.transition(SessionState::Completed);
        }
    }

    /// Frame loop stopped on its own: a terminal error event or a cancel.
    fn settle(&mut self) {
        if self.state == SessionState::Errored {
            return;
        }
        self.cancelled();
    }

    /// Failure before any byte arrived.
    async fn pre_stream_failure(&mut self, err: StreamError) {
        if self.config.fallback_enabled {
            self.run_fallback(err).await;
        } else {
            tracing::error!(code = err.error_code(), "Streaming request failed: {}", err);
            self.fail(err);
        }
    }

    /// Failure while reading the body.
    async fn transport_failure(&mut self, err: StreamError) {
        if self.state == SessionState::Opening {
            return self.pre_stream_failure(err).await;
        }
        tracing::error!(code = err.error_code(), "Stream failed mid-flight: {}", err);
        self.dispatcher.flush();
        if self.terminal_delivered {
            // The complete event already went out
            self.transition(SessionState::Completed);
            return;
        }
        self.fail(err);
    }

    async fn run_fallback(&mut self, streaming_err: StreamError) {
        tracing::warn!("Streaming unavailable ({}), falling back", streaming_err);
        self.transition(SessionState::Fallback);
        self.used_fallback = true;

        let cancel = self.cancel.clone();
        let client = Arc::clone(&self.client);
        let request = self.request.non_streaming(&self.config.stream_flag);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(),
            result = timed(self.config.fallback_timeout, TimeoutPhase::Fallback, client.send(&request)) => result,
        };

        let body = match result {
            Ok(Ok(response)) if response.is_success() => response
                .json::<Value>()
                .map_err(|e| format!("invalid JSON body: {}", e)),
            Ok(Ok(response)) => Err(HttpError::ServerError {
                status: response.status,
                message: response.text().unwrap_or_default(),
            }
            .to_string()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        let body = match body {
            Ok(body) => body,
            Err(fallback) => {
                let err = StreamError::FallbackExhausted {
                    streaming: streaming_err.to_string(),
                    fallback,
                };
                tracing::error!(code = err.error_code(), "{}", err);
                return self.fail(err);
            }
        };

        self.terminal_delivered = true;
        let finished = SimulatedProgressSession::new(&self.config)
            .replay(&mut self.dispatcher, &cancel, body)
            .await;

        if finished {
            self.transition(SessionState::Completed);
        } else {
            self.cancelled();
        }
    }

    /// Deliver the single terminal `error` event and end ERRORED.
    fn fail(&mut self, err: StreamError) {
        tracing::debug!(
            category = %err.category(),
            retryable = err.is_retryable(),
            "Session failing"
        );
        if !self.terminal_delivered {
            self.terminal_delivered = true;
            self.dispatcher
                .dispatch(Event::error(err.user_message(), err.error_code()));
            self.dispatcher.flush();
        }
        if self.dispatcher.is_cancelled() {
            self.cancelled();
        } else {
            self.error = Some(err);
            self.transition(SessionState::Errored);
        }
    }

    fn cancelled(&mut self) {
        tracing::info!(pending = self.dispatcher.pending_len(), "Session cancelled");
        self.transition(SessionState::Cancelled);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "Session state change");
        self.state = next;
    }

    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            session_id: self.id.clone(),
            state: self.state,
            events_dispatched: self.dispatcher.delivered_count(),
            frames_dropped: self.frames_dropped,
            bytes_received: self.bytes_received,
            used_fallback: self.used_fallback,
            error: self.error.clone(),
        }
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Await `fut`, failing with a timeout error once `deadline` elapses.
async fn timed<F>(
    deadline: Option<Duration>,
    phase: TimeoutPhase,
    fut: F,
) -> Result<F::Output, StreamError>
where
    F: Future,
{
    match deadline {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| StreamError::Timeout { phase, after }),
        None => Ok(fut.await),
    }
}
