//! Binary frame format for the ZTeraDB wire protocol.
//!
//! Frame layout (4-byte header + payload), identical in both directions:
//!
//! ```text
//! +-------------+------------------------------+
//! | payload_len | payload                      |
//! | 4 bytes BE  | payload_len bytes UTF-8 JSON |
//! +-------------+------------------------------+
//! ```

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Decodes a big-endian length prefix. Cannot fail once 4 bytes are in hand.
pub fn decode_length(prefix: [u8; LENGTH_PREFIX_SIZE]) -> u32 {
    u32::from_be_bytes(prefix)
}

/// A parsed wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload (UTF-8 JSON).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Creates a new frame from a JSON-serializable value.
    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(Bytes::from(payload)))
    }

    /// Encodes the frame into bytes. The prefix is the payload's byte count,
    /// not its character count.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + self.payload.len());
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Some(frame)` if a complete frame was decoded, or `None` if
    /// more data is needed.
    pub fn decode(buf: &mut BytesMut) -> Option<Self> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return None;
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if buf.len() < LENGTH_PREFIX_SIZE + len {
            return None;
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let payload = buf.split_to(len).freeze();
        Some(Self { payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let payload = Bytes::from(r#"{"response_code":7,"data":{"id":1}}"#);
        let frame = Frame::new(payload.clone());

        let mut buf = frame.encode();
        let decoded = Frame::decode(&mut buf).unwrap();

        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_exact_wire_bytes() {
        // {"a":1} is 7 bytes; prefix 00 00 00 07.
        let frame = Frame::new(Bytes::from(r#"{"a":1}"#));
        let encoded = frame.encode();
        assert_eq!(
            encoded.as_ref(),
            &[0x00, 0x00, 0x00, 0x07, 0x7B, 0x22, 0x61, 0x22, 0x3A, 0x31, 0x7D]
        );
    }

    #[test]
    fn test_decode_length_is_big_endian() {
        assert_eq!(decode_length([0x00, 0x00, 0x00, 0x06]), 6);
        assert_eq!(decode_length([0x01, 0x02, 0x03, 0x04]), 0x0102_0304);
        assert_eq!(decode_length([0xFF, 0xFF, 0xFF, 0xFF]), u32::MAX);
    }

    #[test]
    fn test_prefix_counts_bytes_not_chars() {
        // "é" is one char but two bytes.
        let frame = Frame::new(Bytes::from(r#"{"k":"é"}"#));
        let encoded = frame.encode();
        let prefix: [u8; 4] = encoded[..4].try_into().unwrap();
        assert_eq!(decode_length(prefix) as usize, frame.payload.len());
        assert_eq!(decode_length(prefix), 10);
    }

    #[test]
    fn test_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(Frame::decode(&mut buf).is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_incomplete_payload() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x05, b'{', b'}'][..]);
        assert!(Frame::decode(&mut buf).is_none());
        // Nothing consumed until the frame is whole.
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(Bytes::new());
        let mut buf = frame.encode();
        assert_eq!(buf.as_ref(), &[0x00, 0x00, 0x00, 0x00]);
        let decoded = Frame::decode(&mut buf).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let frame1 = Frame::new(Bytes::from(r#"{"id":1}"#));
        let frame2 = Frame::new(Bytes::from(r#"{"id":2}"#));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame1.encode());
        buf.extend_from_slice(&frame2.encode());

        assert_eq!(Frame::decode(&mut buf).unwrap(), frame1);
        assert_eq!(Frame::decode(&mut buf).unwrap(), frame2);
        assert!(Frame::decode(&mut buf).is_none());
    }

    #[test]
    fn test_frame_from_json() {
        #[derive(serde::Serialize)]
        struct Msg {
            value: i32,
        }
        let frame = Frame::from_json(&Msg { value: 42 }).unwrap();
        assert_eq!(frame.payload.as_ref(), br#"{"value":42}"#);
    }
}
