/*
[INPUT]:  Error sources (topic registry, serialization, transport, configuration)
[OUTPUT]: Structured error type shared by the messaging runtime
[POS]:    Error handling layer - unified error type for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the messaging runtime
#[derive(Error, Debug)]
pub enum MessagingError {
    /// A typed channel exists for the topic but carries another payload type
    #[error("topic `{topic}` does not carry payload type `{expected}`")]
    PayloadMismatch {
        topic: &'static str,
        expected: &'static str,
    },

    /// Two topic declarations share a wire name
    #[error("topic `{0}` is declared more than once")]
    DuplicateTopic(&'static str),

    /// The wire name does not belong to the topic registry
    #[error("unknown topic `{0}`")]
    UnknownTopic(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport worker is gone
    #[error("transport closed")]
    TransportClosed,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<url::ParseError> for MessagingError {
    fn from(err: url::ParseError) -> Self {
        MessagingError::Config(format!("invalid server url: {err}"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MessagingError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        MessagingError::WebSocket(err.to_string())
    }
}

/// Result type alias for messaging operations
pub type Result<T> = std::result::Result<T, MessagingError>;
