//! Mock implementations for testing.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP transport with scripted responses and chunk boundaries

pub mod http;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
