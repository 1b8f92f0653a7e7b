//! Error types for recall.

use thiserror::Error;

/// Result type alias using recall's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for recall operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Upstream model temporarily unavailable (overloaded, 5xx, timeout).
    /// The only class the bounded retry policy will retry.
    #[error("Upstream unavailable: {0}")]
    UpstreamTransient(String),

    /// Upstream rejected the request (bad request, auth, quota).
    /// Never retried.
    #[error("Upstream rejected request: {0}")]
    UpstreamPermanent(String),

    /// Conversation cache operation failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication/authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl Error {
    /// Whether the bounded retry policy may retry this error.
    ///
    /// Only the service-unavailable/overloaded class qualifies; validation,
    /// auth, and permanent upstream rejections fail immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::UpstreamTransient(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("chat session".to_string());
        assert_eq!(err.to_string(), "Not found: chat session");
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("failed to generate".to_string());
        assert_eq!(err.to_string(), "Embedding error: failed to generate");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("invalid signature".to_string());
        assert_eq!(err.to_string(), "Unauthorized: invalid signature");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::UpstreamTransient("overloaded".into()).is_transient());
        assert!(!Error::UpstreamPermanent("quota exceeded".into()).is_transient());
        assert!(!Error::InvalidInput("bad payload".into()).is_transient());
        assert!(!Error::Inference("parse failure".into()).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
