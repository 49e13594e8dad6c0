//! JSON payload encoding and a buffering frame decoder.

use crate::error::ProtocolError;
use crate::frame::Frame;
use bytes::{Bytes, BytesMut};
use serde_json::Value;

/// How much of an unparsable payload is echoed back in the error message.
pub const JSON_ERROR_SNIPPET_LEN: usize = 500;

/// Encodes a value as JSON payload bytes (without framing).
pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Decodes a JSON payload. On failure the error carries the first
/// [`JSON_ERROR_SNIPPET_LEN`] bytes of the payload.
pub fn decode_json(bytes: &[u8]) -> Result<Value, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|source| ProtocolError::JsonParse {
        source,
        snippet: String::from_utf8_lossy(&bytes[..bytes.len().min(JSON_ERROR_SNIPPET_LEN)])
            .into_owned(),
    })
}

/// Incremental frame decoder over a growable buffer.
///
/// Useful for tests and for consumers that receive bytes in arbitrary chunks;
/// the transport itself reads exact lengths off the socket.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Option<Frame> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode the next frame's payload as JSON.
    pub fn decode_payload(&mut self) -> Result<Option<Value>, ProtocolError> {
        match self.decode_frame() {
            Some(frame) => decode_json(&frame.payload).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
