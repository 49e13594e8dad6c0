//! Protocol error types.

use thiserror::Error;

/// Errors that can occur during framing or payload handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A received payload is not valid JSON. The snippet carries at most the
    /// first 500 bytes of the offending payload.
    #[error("invalid JSON payload: {source}; payload begins with: {snippet:?}")]
    JsonParse {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    /// A value could not be serialized to JSON.
    #[error("JSON encode error: {0}")]
    JsonEncode(#[from] serde_json::Error),

    /// The peer closed or the read failed before a full frame arrived.
    #[error("connection closed or interrupted")]
    Interrupted,

    /// The frame decoded as JSON but does not match the expected envelope.
    #[error("malformed response frame: {0}")]
    MalformedFrame(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
