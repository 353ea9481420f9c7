//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - request/response and streamed-body transport

pub mod http;

pub use http::{
    ByteStream, Headers, HttpClient, HttpError, Method, Response, StreamingResponse,
    TransportRequest,
};
