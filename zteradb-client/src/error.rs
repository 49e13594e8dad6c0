//! Client error types.

use serde_json::Value;
use thiserror::Error;
use zteradb_protocol::ProtocolError;
use zteradb_query::BuildError;

/// Client errors.
///
/// Every kind maps to a stable integer code via [`ClientError::code`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket create/connect failed, or a read deadline expired.
    #[error("connection error: {0}")]
    Connection(String),

    /// Acquiring would exceed the configured pool ceiling.
    #[error("connection pool exhausted ({max} transports in use)")]
    PoolExhausted { max: u32 },

    /// The pool has been closed.
    #[error("pool is closed")]
    PoolClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Invalid user input: bad type, empty key, reserved field, malformed
    /// handshake token fields, and the like.
    #[error("invalid value: {0}")]
    Value(String),

    /// The server answered a query with a non-data, non-terminator frame.
    #[error("query failed with server code {code:#x}: {data}")]
    Query { code: u16, data: Value },

    /// The server sent the terminator without any data frames, for a call
    /// that requires at least one row.
    #[error("server returned no data before the query terminator")]
    NoResponseData,
}

impl ClientError {
    /// Stable integer code for this error kind.
    pub fn code(&self) -> u32 {
        match self {
            ClientError::Connection(_)
            | ClientError::PoolExhausted { .. }
            | ClientError::PoolClosed => 10,
            ClientError::Protocol(ProtocolError::JsonParse { .. }) => 100,
            ClientError::Protocol(_) => 20,
            ClientError::Auth(_) => 30,
            ClientError::Value(_) => 40,
            ClientError::Query { .. } => 90,
            ClientError::NoResponseData => 101,
        }
    }
}

impl From<BuildError> for ClientError {
    fn from(err: BuildError) -> Self {
        ClientError::Value(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stable_codes() {
        assert_eq!(ClientError::Connection("x".into()).code(), 10);
        assert_eq!(ClientError::PoolExhausted { max: 1 }.code(), 10);
        assert_eq!(
            ClientError::Protocol(ProtocolError::Interrupted).code(),
            20
        );
        assert_eq!(ClientError::Auth("denied".into()).code(), 30);
        assert_eq!(ClientError::Value("bad".into()).code(), 40);
        assert_eq!(
            ClientError::Query {
                code: 0x402,
                data: json!("unknown field")
            }
            .code(),
            90
        );
        assert_eq!(ClientError::NoResponseData.code(), 101);
    }

    #[test]
    fn test_json_parse_maps_to_100() {
        let err = zteradb_protocol::codec::decode_json(b"nope").unwrap_err();
        assert_eq!(ClientError::Protocol(err).code(), 100);
    }

    #[test]
    fn test_build_error_converts_to_value() {
        let err: ClientError = BuildError::MissingQueryType.into();
        assert_eq!(err.code(), 40);
    }
}
