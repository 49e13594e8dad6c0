//! Handshake construction and token lifecycle.

use crate::config::ClientConfig;
use crate::error::ClientError;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zteradb_protocol::message::{HandshakeRequest, HandshakeResponse, RequestType, TokenGrant};

/// A token within this horizon of its expiry is treated as expired.
pub const TOKEN_EXPIRY_MARGIN_MINUTES: i64 = 15;

fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// Builds handshake documents and interprets the server's reply.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client_key: String,
    access_key: String,
    secret_key: String,
}

impl Authenticator {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client_key: config.client_key.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// A fresh handshake document. The nonce is regenerated on every call
    /// from 16 independent random bytes.
    pub fn handshake_request(&self) -> HandshakeRequest {
        let mut seed = [0u8; 16];
        OsRng.fill_bytes(&mut seed);
        let nonce = sha256_hex(
            format!("{}{}{}", hex::encode(seed), self.access_key, self.client_key).as_bytes(),
        );
        self.request_with_nonce(&nonce)
    }

    /// The handshake document for a known nonce.
    pub fn request_with_nonce(&self, nonce: &str) -> HandshakeRequest {
        HandshakeRequest {
            access_key: self.access_key.clone(),
            client_key: self.client_key.clone(),
            nonce: nonce.to_string(),
            request_token: sha256_hex(format!("{}{}", self.secret_key, nonce).as_bytes()),
            request_type: RequestType::Connect,
        }
    }

    /// Interprets the single handshake reply frame.
    pub fn parse_response(&self, response: &HandshakeResponse) -> Result<ServerToken, ClientError> {
        if response.error {
            let message = match response.data.as_str() {
                Some(text) => text.to_string(),
                None => response.data.to_string(),
            };
            return Err(ClientError::Auth(message));
        }

        let grant: TokenGrant = serde_json::from_value(response.data.clone()).map_err(|e| {
            ClientError::Value(format!("handshake response missing token fields: {e}"))
        })?;

        Ok(ServerToken {
            client_key: grant.client_key,
            access_token: grant.access_token,
            expires_at: grant.access_token_expire,
        })
    }
}

/// Server-issued access token bound to one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToken {
    pub client_key: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl ServerToken {
    /// Expired when `now` is within the safety margin of, or past, the
    /// expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::minutes(TOKEN_EXPIRY_MARGIN_MINUTES)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;
    use zteradb_query::Env;

    fn authenticator() -> Authenticator {
        Authenticator::new(&ClientConfig::new("K", "A", "S", "db-1", Env::Dev))
    }

    #[test]
    fn test_request_with_known_nonce() {
        let request = authenticator().request_with_nonce("N");
        assert_eq!(request.access_key, "A");
        assert_eq!(request.client_key, "K");
        assert_eq!(request.nonce, "N");
        // SHA256("SN"), secret_key || nonce.
        assert_eq!(request.request_token, sha256_hex(b"SN"));
        assert_eq!(request.request_type, RequestType::Connect);
    }

    #[test]
    fn test_nonce_is_64_hex_chars_and_fresh() {
        let auth = authenticator();
        let first = auth.handshake_request();
        let second = auth.handshake_request();

        assert_eq!(first.nonce.len(), 64);
        assert!(first.nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(first.nonce.chars().all(|c| !c.is_ascii_uppercase()));
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.request_token, second.request_token);
    }

    #[test]
    fn test_parse_success_response() {
        let response = HandshakeResponse {
            error: false,
            data: json!({
                "client_key": "K",
                "access_key": "A",
                "access_token": "T",
                "access_token_expire": "2099-01-01T00:00:00Z",
            }),
        };
        let token = authenticator().parse_response(&response).unwrap();
        assert_eq!(token.client_key, "K");
        assert_eq!(token.access_token, "T");
        assert!(!token.is_expired());
    }

    #[test]
    fn test_parse_error_response() {
        let response = HandshakeResponse {
            error: true,
            data: json!("bad credentials"),
        };
        let err = authenticator().parse_response(&response).unwrap_err();
        assert_eq!(err.code(), 30);
        assert!(err.to_string().contains("bad credentials"));
    }

    #[test]
    fn test_parse_missing_token_field() {
        let response = HandshakeResponse {
            error: false,
            data: json!({
                "client_key": "K",
                "access_key": "A",
                "access_token_expire": "2099-01-01T00:00:00Z",
            }),
        };
        let err = authenticator().parse_response(&response).unwrap_err();
        assert_eq!(err.code(), 40);
    }

    #[test]
    fn test_token_expiry_horizon() {
        let expires_at = Utc::now() + Duration::minutes(60);
        let token = ServerToken {
            client_key: "K".into(),
            access_token: "T".into(),
            expires_at,
        };

        // Fresh well outside the margin.
        assert!(!token.is_expired_at(expires_at - Duration::minutes(30)));
        // Expired exactly at the margin and inside it.
        assert!(token.is_expired_at(expires_at - Duration::minutes(15)));
        assert!(token.is_expired_at(expires_at - Duration::minutes(1)));
        // Expired past the instant itself.
        assert!(token.is_expired_at(expires_at + Duration::seconds(1)));
    }
}
