//! JSON message types and numeric wire codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Request type codes carried in the `request_type` field.
///
/// Codes 0x008 through 0x025 are reserved for schema administration and are
/// not exercised by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestType {
    Connect = 0x001,
    Disconnect = 0x003,
    Query = 0x005,
    Ping = 0x007,
}

impl RequestType {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x001 => Some(RequestType::Connect),
            0x003 => Some(RequestType::Disconnect),
            0x005 => Some(RequestType::Query),
            0x007 => Some(RequestType::Ping),
            _ => None,
        }
    }
}

// Request types travel as JSON integers, so the serde impls go through u16
// rather than the usual string renames.
impl Serialize for RequestType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for RequestType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        RequestType::from_u16(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown request type {code:#x}")))
    }
}

/// Response type codes carried in the `response_code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResponseCode {
    Connected = 0x002,
    Disconnected = 0x004,
    DisconnectError = 0x005,
    ClientAuthError = 0x006,
    QueryData = 0x007,
    QueryError = 0x009,
    Pong = 0x010,
    NoAccess = 0x011,
    ParseQueryError = 0x100,
    CreateSchemaSuccess = 0x201,
    PublishSchemaSuccess = 0x202,
    TokenExpired = 0x400,
    InvalidSchema = 0x401,
    FieldError = 0x402,
    ConnectError = 0x500,
    CreateSchemaError = 0x501,
    PublishSchemaError = 0x502,
    QueryComplete = 0x608,
}

impl ResponseCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x002 => Some(ResponseCode::Connected),
            0x004 => Some(ResponseCode::Disconnected),
            0x005 => Some(ResponseCode::DisconnectError),
            0x006 => Some(ResponseCode::ClientAuthError),
            0x007 => Some(ResponseCode::QueryData),
            0x009 => Some(ResponseCode::QueryError),
            0x010 => Some(ResponseCode::Pong),
            0x011 => Some(ResponseCode::NoAccess),
            0x100 => Some(ResponseCode::ParseQueryError),
            0x201 => Some(ResponseCode::CreateSchemaSuccess),
            0x202 => Some(ResponseCode::PublishSchemaSuccess),
            0x400 => Some(ResponseCode::TokenExpired),
            0x401 => Some(ResponseCode::InvalidSchema),
            0x402 => Some(ResponseCode::FieldError),
            0x500 => Some(ResponseCode::ConnectError),
            0x501 => Some(ResponseCode::CreateSchemaError),
            0x502 => Some(ResponseCode::PublishSchemaError),
            0x608 => Some(ResponseCode::QueryComplete),
            _ => None,
        }
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for ResponseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        ResponseCode::from_u16(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown response code {code:#x}")))
    }
}

/// Handshake document sent over a freshly opened transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub access_key: String,
    pub client_key: String,
    /// SHA256(hex(random_16_bytes) || access_key || client_key), lowercase hex.
    pub nonce: String,
    /// SHA256(secret_key || nonce), lowercase hex.
    pub request_token: String,
    pub request_type: RequestType,
}

/// The single reply frame to a handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(default)]
    pub error: bool,
    /// Token grant object on success; an error message otherwise.
    #[serde(default)]
    pub data: Value,
}

/// Server-issued token fields inside a successful handshake reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub client_key: String,
    pub access_key: String,
    pub access_token: String,
    pub access_token_expire: DateTime<Utc>,
}

/// Query request envelope: `{query, request_type, database_id, env}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: Value,
    pub request_type: RequestType,
    pub database_id: String,
    pub env: String,
}

impl QueryRequest {
    pub fn new(query: Value, database_id: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            query,
            request_type: RequestType::Query,
            database_id: database_id.into(),
            env: env.into(),
        }
    }
}

/// Graceful-teardown request sent before closing a pooled transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectRequest {
    pub request_type: RequestType,
}

impl DisconnectRequest {
    pub fn new() -> Self {
        Self {
            request_type: RequestType::Disconnect,
        }
    }
}

impl Default for DisconnectRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Liveness check; the server answers with a PONG frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    pub request_type: RequestType,
}

impl PingRequest {
    pub fn new() -> Self {
        Self {
            request_type: RequestType::Ping,
        }
    }
}

impl Default for PingRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame of a streamed query response.
///
/// The raw `u16` is kept so frames with codes this client does not know
/// survive deserialization; [`ResponseFrame::code`] gives the typed view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub response_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseFrame {
    pub fn new(code: ResponseCode, data: Option<Value>) -> Self {
        Self {
            response_code: code.as_u16(),
            data,
        }
    }

    pub fn code(&self) -> Option<ResponseCode> {
        ResponseCode::from_u16(self.response_code)
    }

    /// Whether this frame is the stream terminator.
    pub fn is_complete(&self) -> bool {
        self.code() == Some(ResponseCode::QueryComplete)
    }

    /// Whether this frame carries a streamed data row.
    pub fn is_data(&self) -> bool {
        self.code() == Some(ResponseCode::QueryData)
    }
}
