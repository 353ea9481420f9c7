//! Mock HTTP client for testing.
//!
//! Provides a scripted transport: streamed bodies are delivered chunk by
//! chunk exactly as configured, so tests control every chunk boundary.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{
    ByteStream, Headers, HttpClient, HttpError, Response, StreamingResponse, TransportRequest,
};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET or POST)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body, if any
    pub body: Option<String>,
    /// Whether the request went through `send_stream`
    pub streaming: bool,
}

/// Configuration for a mock response.
///
/// `Success`, `Error` and `Delayed` answer `send`; every other variant
/// answers `send_stream`.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a buffered response
    Success(Response),
    /// Fail the buffered request
    Error(HttpError),
    /// Return a buffered response after a delay
    Delayed(Duration, Response),
    /// Stream these chunks with status 200, then end
    Stream(Vec<Bytes>),
    /// Open the stream with this status and an empty body
    StreamStatus(u16),
    /// Fail to open the stream
    StreamError(HttpError),
    /// Stream these chunks, then fail
    StreamThenError(Vec<Bytes>, HttpError),
    /// Stream these chunks, then never yield again
    StreamThenHang(Vec<Bytes>),
    /// Never finish opening the stream
    Hang,
}

impl MockResponse {
    fn is_stream(&self) -> bool {
        !matches!(
            self,
            MockResponse::Success(_) | MockResponse::Error(_) | MockResponse::Delayed(..)
        )
    }
}

/// Mock HTTP client for testing.
///
/// Responses are matched by exact URL first, then by URL prefix, so a
/// response set for `http://host/path` also answers `http://host/path?stream=true`.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use draftwire::adapters::mock::{MockHttpClient, MockResponse};
/// use draftwire::traits::Response;
///
/// let client = MockHttpClient::new();
/// client.set_response(
///     "http://backend/assist",
///     MockResponse::Stream(vec![Bytes::from("data: [DONE]\n")]),
/// );
/// client.set_response(
///     "http://backend/assist",
///     MockResponse::Success(Response::new(200, Bytes::from("{}"))),
/// );
/// assert!(client.get_requests().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    /// Responses for `send_stream`, by URL pattern
    stream_responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// Responses for `send`, by URL pattern
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for a URL, on the streamed or buffered side
    /// depending on the variant.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let target = if response.is_stream() {
            &self.stream_responses
        } else {
            &self.responses
        };
        target.lock().unwrap().insert(url.to_string(), response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Clear all configured responses.
    pub fn clear_responses(&self) {
        self.stream_responses.lock().unwrap().clear();
        self.responses.lock().unwrap().clear();
    }

    fn record_request(&self, request: &TransportRequest, streaming: bool) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            streaming,
        });
    }

    fn lookup(map: &Mutex<HashMap<String, MockResponse>>, url: &str) -> Option<MockResponse> {
        let responses = map.lock().unwrap();

        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        responses
            .iter()
            .find(|(pattern, _)| url.starts_with(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }
}

fn chunk_stream(chunks: Vec<Bytes>) -> impl futures::Stream<Item = Result<Bytes, HttpError>> {
    stream::iter(chunks.into_iter().map(Ok))
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: &TransportRequest) -> Result<Response, HttpError> {
        self.record_request(request, false);

        match Self::lookup(&self.responses, &request.url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(_) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!(
                "No mock response for URL: {}",
                request.url
            ))),
        }
    }

    async fn send_stream(
        &self,
        request: &TransportRequest,
    ) -> Result<StreamingResponse, HttpError> {
        self.record_request(request, true);

        let body: ByteStream = match Self::lookup(&self.stream_responses, &request.url) {
            Some(MockResponse::Stream(chunks)) => Box::pin(chunk_stream(chunks)),
            Some(MockResponse::StreamStatus(status)) => {
                return Ok(StreamingResponse::new(status, Box::pin(stream::empty())));
            }
            Some(MockResponse::StreamError(err)) => return Err(err),
            Some(MockResponse::StreamThenError(chunks, err)) => {
                let failure = stream::once(async move { Err::<Bytes, HttpError>(err) });
                Box::pin(chunk_stream(chunks).chain(failure))
            }
            Some(MockResponse::StreamThenHang(chunks)) => {
                Box::pin(chunk_stream(chunks).chain(stream::pending()))
            }
            Some(MockResponse::Hang) => std::future::pending().await,
            Some(_) => {
                return Err(HttpError::Other(
                    "Non-stream response on stream request".to_string(),
                ))
            }
            None => {
                return Err(HttpError::Other(format!(
                    "No mock response for URL: {}",
                    request.url
                )))
            }
        };

        Ok(StreamingResponse::new(200, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/stream";

    #[tokio::test]
    async fn test_send_with_response() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Success(Response::new(200, Bytes::from("Hello"))),
        );

        let response = client.send(&TransportRequest::get(URL)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from("Hello"));

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert!(!requests[0].streaming);
    }

    #[tokio::test]
    async fn test_send_with_error() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Error(HttpError::ServerError {
                status: 500,
                message: "Internal Server Error".to_string(),
            }),
        );

        match client.send(&TransportRequest::get(URL)).await {
            Err(HttpError::ServerError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("Expected ServerError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_chunks_in_order() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Stream(vec![
                Bytes::from("chunk1"),
                Bytes::from("chunk2"),
                Bytes::from("chunk3"),
            ]),
        );

        let request = TransportRequest::post(URL, "{}").streaming("stream");
        let response = client.send_stream(&request).await.unwrap();
        assert!(response.is_success());

        let chunks: Vec<Bytes> = response
            .body
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["chunk1", "chunk2", "chunk3"]);

        let requests = client.get_requests();
        assert!(requests[0].streaming);
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"stream":true}"#));
    }

    #[tokio::test]
    async fn test_stream_then_error() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::StreamThenError(
                vec![Bytes::from("a")],
                HttpError::Io("reset".to_string()),
            ),
        );

        let response = client.send_stream(&TransportRequest::get(URL)).await.unwrap();
        let items: Vec<_> = response.body.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err(HttpError::Io("reset".to_string())));
    }

    #[tokio::test]
    async fn test_prefix_match_and_sides() {
        let client = MockHttpClient::new();
        client.set_response(URL, MockResponse::StreamStatus(502));

        let streamed = client
            .send_stream(&TransportRequest::get(URL).streaming("stream"))
            .await
            .unwrap();
        assert_eq!(streamed.status, 502);

        let buffered = client.send(&TransportRequest::get(URL)).await;
        assert!(matches!(buffered, Err(HttpError::Other(_))));
    }

    #[tokio::test]
    async fn test_no_response_configured() {
        let client = MockHttpClient::new();
        let result = client.send_stream(&TransportRequest::get(URL)).await;
        assert!(matches!(result, Err(HttpError::Other(_))));
    }

    #[test]
    fn test_clear_requests() {
        let client = MockHttpClient::new();
        client.record_request(&TransportRequest::get(URL), false);
        assert_eq!(client.get_requests().len(), 1);

        client.clear_requests();
        assert!(client.get_requests().is_empty());
    }
}
