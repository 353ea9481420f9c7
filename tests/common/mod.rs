//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use draftwire::adapters::mock::{MockHttpClient, MockResponse};
use draftwire::{Event, SessionConfig, StreamSession};
use draftwire::traits::{Response, TransportRequest};

pub const URL: &str = "http://backend/assist";

/// Captured event stream of one session.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a session as an observer of every event.
    pub fn attach(&self, session: StreamSession) -> StreamSession {
        let sink = Arc::clone(&self.events);
        session.on_any(move |event| sink.lock().unwrap().push(event.clone()))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_terminal()).count()
    }
}

/// Config with no stage pauses, for fast fallback tests.
pub fn fast_config() -> SessionConfig {
    SessionConfig::default().without_stage_delay()
}

/// Split `text` into chunks at the given byte offsets.
pub fn split_at(text: &str, offsets: &[usize]) -> Vec<Bytes> {
    let bytes = text.as_bytes();
    let mut chunks = Vec::new();
    let mut start = 0;
    for &offset in offsets {
        chunks.push(Bytes::copy_from_slice(&bytes[start..offset]));
        start = offset;
    }
    chunks.push(Bytes::copy_from_slice(&bytes[start..]));
    chunks
}

/// Client streaming `chunks` on the streamed path.
pub fn streaming_client(chunks: Vec<Bytes>) -> MockHttpClient {
    let client = MockHttpClient::new();
    client.set_response(URL, MockResponse::Stream(chunks));
    client
}

/// Client whose streamed path fails and whose buffered path returns `body`.
pub fn fallback_client(stream: MockResponse, body: &str) -> MockHttpClient {
    let client = MockHttpClient::new();
    client.set_response(URL, stream);
    client.set_response(
        URL,
        MockResponse::Success(Response::new(200, Bytes::from(body.to_string()))),
    );
    client
}

/// Session over `client` posting an empty JSON object to [`URL`].
pub fn session(client: MockHttpClient, config: SessionConfig, recorder: &Recorder) -> StreamSession {
    let session = StreamSession::new(Arc::new(client), TransportRequest::post(URL, "{}"))
        .with_config(config);
    recorder.attach(session)
}
