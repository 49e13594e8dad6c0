//! # zteradb-protocol
//!
//! Wire protocol implementation for ZTeraDB.
//!
//! This crate provides:
//! - Binary framing with a 4-byte big-endian length prefix
//! - JSON payload encoding/decoding
//! - Request/response message types and numeric wire codes
//! - Protocol error types

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{decode_json, encode_json, Decoder};
pub use error::ProtocolError;
pub use frame::{decode_length, Frame, LENGTH_PREFIX_SIZE};
pub use message::{
    DisconnectRequest, HandshakeRequest, HandshakeResponse, PingRequest, QueryRequest,
    RequestType, ResponseCode, ResponseFrame, TokenGrant,
};
