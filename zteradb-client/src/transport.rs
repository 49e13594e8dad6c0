//! Transport management.
//!
//! A [`Transport`] owns one TCP (or TLS) connection to the server and speaks
//! the framed protocol over it: send one frame, then stream-read response
//! frames until the terminator code.

use crate::auth::ServerToken;
use crate::error::ClientError;
use crate::stream::TransportStream;
use crate::tls;
use bytes::Bytes;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use zteradb_protocol::codec;
use zteradb_protocol::frame::{decode_length, Frame, LENGTH_PREFIX_SIZE};
use zteradb_protocol::message::{HandshakeResponse, ResponseFrame};
use zteradb_protocol::ProtocolError;

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Options for opening transports.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Optional per-read deadline; exceeding it closes the transport and
    /// surfaces as a connection error.
    pub read_deadline: Option<Duration>,
    /// Request TLS at the transport layer.
    pub use_tls: bool,
    /// Verify the peer hostname when TLS is on.
    pub verify_tls_host: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_deadline: None,
            use_tls: false,
            verify_tls_host: false,
        }
    }
}

/// One connection to a ZTeraDB server, plus its current server token.
pub struct Transport {
    id: u64,
    stream: Option<TransportStream>,
    token: Option<ServerToken>,
    read_deadline: Option<Duration>,
    peer: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}

impl Transport {
    /// Opens a TCP connection, upgrading to TLS when requested. Failures
    /// identify the stage (resolve/connect vs. TLS handshake).
    pub async fn open(
        host: &str,
        port: u16,
        options: &TransportOptions,
    ) -> Result<Self, ClientError> {
        let peer = format!("{host}:{port}");

        let tcp = tokio::time::timeout(options.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClientError::Connection(format!("timed out connecting to {peer}")))?
            .map_err(|e| ClientError::Connection(format!("failed to connect to {peer}: {e}")))?;
        tcp.set_nodelay(true).ok();

        let stream = if options.use_tls {
            let (connector, server_name) = tls::create_connector(host, options.verify_tls_host)?;
            let tls_stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| {
                    ClientError::Connection(format!("TLS handshake with {peer} failed: {e}"))
                })?;
            TransportStream::tls(tls_stream)
        } else {
            TransportStream::tcp(tcp)
        };

        let id = NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            transport = id,
            encrypted = stream.is_encrypted(),
            "connected to {}",
            peer
        );

        Ok(Self {
            id,
            stream: Some(stream),
            token: None,
            read_deadline: options.read_deadline,
            peer,
        })
    }

    /// Process-unique transport identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn token(&self) -> Option<&ServerToken> {
        self.token.as_ref()
    }

    pub fn set_token(&mut self, token: ServerToken) {
        self.token = Some(token);
    }

    /// Frames the payload and writes it in full.
    pub async fn send(&mut self, payload: Bytes) -> Result<(), ClientError> {
        let frame = Frame::new(payload).encode();

        let result = match self.stream.as_mut() {
            Some(stream) => stream.write_all(&frame).await,
            None => return Err(ClientError::Connection("transport is closed".into())),
        };

        if let Err(e) = result {
            self.close();
            return Err(ClientError::Connection(format!(
                "write to {} failed: {e}",
                self.peer
            )));
        }
        Ok(())
    }

    /// Serializes a value and sends it as one frame.
    pub async fn send_json<T: serde::Serialize>(&mut self, value: &T) -> Result<(), ClientError> {
        let payload = codec::encode_json(value)?;
        self.send(payload).await
    }

    /// One streamed response step: the next decoded frame, or `None` at the
    /// terminator. The terminator itself is a normally framed JSON body; the
    /// sentinel is its `response_code`.
    pub async fn receive_next(&mut self) -> Result<Option<ResponseFrame>, ClientError> {
        let value = self.read_frame_value().await?;
        let frame: ResponseFrame = match serde_json::from_value(value) {
            Ok(frame) => frame,
            Err(e) => {
                self.close();
                return Err(ProtocolError::MalformedFrame(e.to_string()).into());
            }
        };

        if frame.is_complete() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    /// Reads the single handshake reply frame.
    pub async fn receive_handshake(&mut self) -> Result<HandshakeResponse, ClientError> {
        let value = self.read_frame_value().await?;
        match serde_json::from_value(value) {
            Ok(response) => Ok(response),
            Err(e) => {
                self.close();
                Err(ProtocolError::MalformedFrame(e.to_string()).into())
            }
        }
    }

    /// A finite, forward-only view over the remaining frames of one
    /// response. Once drained it stays empty.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            transport: self,
            finished: false,
        }
    }

    /// Releases the socket. Idempotent; a second call is a no-op.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(transport = self.id, "transport to {} closed", self.peer);
        }
    }

    async fn read_frame_value(&mut self) -> Result<Value, ClientError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.read_exact_or_close(&mut prefix).await?;
        let len = decode_length(prefix) as usize;

        let mut payload = vec![0u8; len];
        self.read_exact_or_close(&mut payload).await?;

        match codec::decode_json(&payload) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.close();
                Err(e.into())
            }
        }
    }

    /// Reads exactly `buf.len()` bytes. A short read, read error, or missed
    /// deadline closes the transport.
    async fn read_exact_or_close(&mut self, buf: &mut [u8]) -> Result<(), ClientError> {
        let deadline = self.read_deadline;
        let result = match self.stream.as_mut() {
            None => return Err(ClientError::Connection("transport is closed".into())),
            Some(stream) => match deadline {
                Some(limit) => match tokio::time::timeout(limit, stream.read_exact(buf)).await {
                    Ok(inner) => inner.map(|_| ()),
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "read deadline exceeded",
                    )),
                },
                None => stream.read_exact(buf).await.map(|_| ()),
            },
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                self.close();
                Err(ClientError::Connection(format!(
                    "read from {} timed out",
                    self.peer
                )))
            }
            Err(_) => {
                self.close();
                Err(ProtocolError::Interrupted.into())
            }
        }
    }
}

/// Borrowing frame sequence returned by [`Transport::frames`].
pub struct Frames<'a> {
    transport: &'a mut Transport,
    finished: bool,
}

impl Frames<'_> {
    /// The next streamed frame; `None` after the terminator or an error.
    pub async fn next(&mut self) -> Option<Result<ResponseFrame, ClientError>> {
        if self.finished {
            return None;
        }
        match self.transport.receive_next().await {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn write_frame(stream: &mut TcpStream, value: &Value) {
        let payload = serde_json::to_vec(value).unwrap();
        let mut buf = Vec::with_capacity(4 + payload.len());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload);
        stream.write_all(&buf).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_refused() {
        // Bind then drop to find a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Transport::open("127.0.0.1", port, &TransportOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 10);
        assert!(err.to_string().contains("failed to connect"));
    }

    #[tokio::test]
    async fn test_stream_until_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            write_frame(&mut stream, &json!({"response_code": 7, "data": {"id": 1}})).await;
            write_frame(&mut stream, &json!({"response_code": 7, "data": {"id": 2}})).await;
            write_frame(&mut stream, &json!({"response_code": 1544})).await;
            // Keep the socket open so the client sees the terminator, not EOF.
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = Transport::open("127.0.0.1", port, &TransportOptions::default())
            .await
            .unwrap();

        let mut ids = Vec::new();
        let mut frames = transport.frames();
        while let Some(frame) = frames.next().await {
            let frame = frame.unwrap();
            assert!(frame.is_data());
            ids.push(frame.data.unwrap()["id"].as_i64().unwrap());
        }
        assert_eq!(ids, [1, 2]);

        // Drained sequences stay empty.
        assert!(frames.next().await.is_none());
        assert!(!transport.is_closed());
    }

    #[tokio::test]
    async fn test_eof_mid_stream_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            write_frame(&mut stream, &json!({"response_code": 7, "data": {"id": 1}})).await;
            // Close without sending the terminator.
        });

        let mut transport = Transport::open("127.0.0.1", port, &TransportOptions::default())
            .await
            .unwrap();

        let first = transport.receive_next().await.unwrap().unwrap();
        assert!(first.is_data());

        let err = transport.receive_next().await.unwrap_err();
        assert_eq!(err.code(), 20);
        assert!(err.to_string().contains("connection closed or interrupted"));
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Announce 100 bytes but send only 3.
            stream.write_all(&100u32.to_be_bytes()).await.unwrap();
            stream.write_all(b"abc").await.unwrap();
        });

        let mut transport = Transport::open("127.0.0.1", port, &TransportOptions::default())
            .await
            .unwrap();
        let err = transport.receive_next().await.unwrap_err();
        assert_eq!(err.code(), 20);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_invalid_json_closes_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&4u32.to_be_bytes()).await.unwrap();
            stream.write_all(b"nope").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut transport = Transport::open("127.0.0.1", port, &TransportOptions::default())
            .await
            .unwrap();
        let err = transport.receive_next().await.unwrap_err();
        assert_eq!(err.code(), 100);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_read_deadline_surfaces_as_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            // Never send anything.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let options = TransportOptions {
            read_deadline: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let mut transport = Transport::open("127.0.0.1", port, &options).await.unwrap();
        let err = transport.receive_next().await.unwrap_err();
        assert_eq!(err.code(), 10);
        assert!(err.to_string().contains("timed out"));
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let mut transport = Transport::open("127.0.0.1", port, &TransportOptions::default())
            .await
            .unwrap();
        transport.close();
        transport.close();
        assert!(transport.is_closed());

        let err = transport
            .send(Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 10);
    }
}
