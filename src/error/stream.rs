//! Streaming session error types.
//!
//! Every failure a session can hit is one of these. Malformed frames are
//! recovered locally; the rest end the session with a single `error` event.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::ErrorCategory;
use crate::traits::HttpError;

/// Suspension point a deadline applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Waiting for response headers of the streaming request
    Opening,
    /// Waiting for the next chunk after streaming began
    Streaming,
    /// Waiting for the non-streamed fallback response
    Fallback,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            TimeoutPhase::Opening => "opening",
            TimeoutPhase::Streaming => "streaming",
            TimeoutPhase::Fallback => "fallback",
        };
        f.write_str(phase)
    }
}

/// Session-level error variants.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// Network or HTTP failure.
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),

    /// A single frame could not be decoded. Never terminal.
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// Streaming could not be established and the fallback request failed too.
    #[error("Streaming failed ({streaming}); fallback failed ({fallback})")]
    FallbackExhausted { streaming: String, fallback: String },

    /// A suspension point exceeded its deadline.
    #[error("Timed out after {after:?} while {phase}")]
    Timeout { phase: TimeoutPhase, after: Duration },

    /// The backend sent an `error` event.
    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StreamError {
    pub fn malformed(reason: impl fmt::Display) -> Self {
        StreamError::MalformedFrame {
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Transport(HttpError::ServerError { status, .. }) if *status < 500 => {
                ErrorCategory::Configuration
            }
            StreamError::Transport(HttpError::InvalidUrl(_)) => ErrorCategory::Configuration,
            StreamError::Transport(HttpError::ServerError { .. }) => ErrorCategory::Server,
            StreamError::Transport(_) | StreamError::Timeout { .. } => ErrorCategory::Network,
            StreamError::MalformedFrame { .. } => ErrorCategory::Protocol,
            StreamError::FallbackExhausted { .. } | StreamError::Backend { .. } => {
                ErrorCategory::Server
            }
        }
    }

    /// Check if this error is likely transient and the request can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport(err) => err.is_retryable(),
            StreamError::Timeout { .. } | StreamError::FallbackExhausted { .. } => true,
            StreamError::MalformedFrame { .. } | StreamError::Backend { .. } => false,
        }
    }

    /// Get a short error code for logging and for terminal `error` events.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Transport(_) => "E_STREAM_TRANSPORT",
            StreamError::MalformedFrame { .. } => "E_STREAM_FRAME",
            StreamError::FallbackExhausted { .. } => "E_STREAM_FALLBACK",
            StreamError::Timeout { .. } => "E_STREAM_TIMEOUT",
            StreamError::Backend { .. } => "E_STREAM_BACKEND",
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Transport(HttpError::ServerError { status, .. }) => {
                format!("The server returned an error (HTTP {}). Please try again.", status)
            }
            StreamError::Transport(_) => {
                "Connection to the server was lost. Please try again.".to_string()
            }
            StreamError::MalformedFrame { .. } => {
                "Received invalid data from server.".to_string()
            }
            StreamError::FallbackExhausted { .. } => {
                "The assistant is unavailable right now. Please try again later.".to_string()
            }
            StreamError::Timeout { phase, after } => {
                let waited = if *after < Duration::from_secs(1) {
                    format!("{} ms", after.as_millis())
                } else {
                    format!("{} seconds", after.as_secs())
                };
                format!("No response from server for {} while {}.", waited, phase)
            }
            StreamError::Backend { message } => format!("Server error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_conversion() {
        let err: StreamError = HttpError::ConnectionFailed("refused".to_string()).into();
        assert!(matches!(err, StreamError::Transport(_)));
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "E_STREAM_TRANSPORT");
        assert_eq!(err.to_string(), "Transport error: Connection failed: refused");
    }

    #[test]
    fn test_status_categories() {
        let client: StreamError = HttpError::ServerError {
            status: 404,
            message: "missing".to_string(),
        }
        .into();
        assert_eq!(client.category(), ErrorCategory::Configuration);
        assert!(!client.is_retryable());
        assert!(client.user_message().contains("404"));

        let server: StreamError = HttpError::ServerError {
            status: 503,
            message: "busy".to_string(),
        }
        .into();
        assert_eq!(server.category(), ErrorCategory::Server);
        assert!(server.is_retryable());
    }

    #[test]
    fn test_malformed_frame_not_retryable() {
        let err = StreamError::malformed("unbalanced braces or brackets");
        assert_eq!(err.category(), ErrorCategory::Protocol);
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "E_STREAM_FRAME");
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn test_timeout_message() {
        let err = StreamError::Timeout {
            phase: TimeoutPhase::Streaming,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.error_code(), "E_STREAM_TIMEOUT");
        assert!(err.user_message().contains("30 seconds"));
        assert!(err.user_message().contains("streaming"));
    }

    #[test]
    fn test_sub_second_timeout_message() {
        let err = StreamError::Timeout {
            phase: TimeoutPhase::Opening,
            after: Duration::from_millis(250),
        };
        assert!(err.user_message().contains("250 ms"));
        assert!(!err.user_message().contains("0 seconds"));
    }

    #[test]
    fn test_fallback_exhausted_display() {
        let err = StreamError::FallbackExhausted {
            streaming: "Connection failed: refused".to_string(),
            fallback: "Server error (500): boom".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("refused"));
        assert!(display.contains("boom"));
        assert_eq!(err.category(), ErrorCategory::Server);
    }
}
