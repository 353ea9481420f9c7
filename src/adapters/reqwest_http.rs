//! Reqwest-based HTTP client adapter.
//!
//! Production implementation of the [`HttpClient`] trait from `crate::traits`.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::traits::{
    Headers, HttpClient, HttpError, Method, Response, StreamingResponse, TransportRequest,
};

/// HTTP client implementation using reqwest.
///
/// Non-2xx statuses are returned as-is, on both the buffered and the
/// streamed path; the session decides what they mean.
///
/// # Example
///
/// ```ignore
/// use draftwire::adapters::ReqwestHttpClient;
/// use draftwire::traits::{HttpClient, TransportRequest};
///
/// let client = ReqwestHttpClient::new();
/// let response = client.send(&TransportRequest::get("https://api.example.com/health")).await?;
/// println!("Status: {}", response.status);
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new ReqwestHttpClient with a custom reqwest::Client.
    ///
    /// Session deadlines are enforced by the session itself; a client-level
    /// timeout here also bounds the whole streamed body.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying reqwest::Client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Convert reqwest error to HttpError.
    fn convert_error(err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_connect() {
            HttpError::ConnectionFailed(err.to_string())
        } else if err.is_builder() {
            HttpError::InvalidUrl(err.to_string())
        } else {
            HttpError::Other(err.to_string())
        }
    }

    /// Convert reqwest headers to our Headers type.
    fn convert_headers(headers: &reqwest::header::HeaderMap) -> Headers {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    /// Build the reqwest request for a transport request.
    fn build(&self, request: &TransportRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }

    async fn execute(&self, request: &TransportRequest) -> Result<reqwest::Response, HttpError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "Sending request");
        self.build(request)
            .send()
            .await
            .map_err(Self::convert_error)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: &TransportRequest) -> Result<Response, HttpError> {
        let response = self.execute(request).await?;

        let status = response.status().as_u16();
        let response_headers = Self::convert_headers(response.headers());
        let body = response.bytes().await.map_err(Self::convert_error)?;

        Ok(Response::with_headers(status, response_headers, body))
    }

    async fn send_stream(
        &self,
        request: &TransportRequest,
    ) -> Result<StreamingResponse, HttpError> {
        let response = self.execute(request).await?;

        let status = response.status().as_u16();
        let headers = Self::convert_headers(response.headers());

        let body = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout(e.to_string())
                } else {
                    HttpError::Io(e.to_string())
                }
            })
        });

        Ok(StreamingResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
