//! Error handling for streaming sessions.
//!
//! - **Error Categories**: high-level classification for handling decisions
//! - **Transport errors**: [`HttpError`](crate::traits::HttpError), produced by
//!   the transport adapters
//! - **Session errors**: [`StreamError`], the taxonomy a session reports
//!
//! | Error | Before first byte | After first byte |
//! |-------|-------------------|------------------|
//! | Transport | fallback, else terminal | terminal |
//! | MalformedFrame | frame dropped | frame dropped |
//! | FallbackExhausted | terminal | n/a |
//! | Timeout | fallback, else terminal | terminal |

mod category;
mod stream;

pub use category::ErrorCategory;
pub use stream::{StreamError, TimeoutPhase};

/// Result type for session operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::traits::HttpError;

    #[test]
    fn test_every_error_has_code_and_message() {
        let errors: Vec<StreamError> = vec![
            HttpError::Timeout("connect".to_string()).into(),
            StreamError::malformed("not json"),
            StreamError::FallbackExhausted {
                streaming: "a".to_string(),
                fallback: "b".to_string(),
            },
            StreamError::Timeout {
                phase: TimeoutPhase::Fallback,
                after: std::time::Duration::from_secs(5),
            },
            StreamError::Backend {
                message: "quota".to_string(),
            },
        ];

        for err in errors {
            assert!(err.error_code().starts_with("E_STREAM_"));
            assert!(!err.user_message().is_empty());
            assert!(!err.category().description().is_empty());
        }
    }

    #[test]
    fn test_json_error_becomes_malformed_frame() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err = StreamError::malformed(json_err);
        assert_eq!(err.category(), ErrorCategory::Protocol);
    }
}
