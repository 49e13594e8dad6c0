//! The socket behind a [`Transport`](crate::transport::Transport).
//!
//! A transport speaks the framed protocol over either bare TCP or TLS on
//! top of TCP, decided once at open time from the configuration. This enum
//! erases that choice so the framing code reads and writes one stream type.

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

pin_project! {
    /// The underlying socket of one transport.
    #[project = TransportStreamProj]
    pub enum TransportStream {
        /// Bare TCP, the default.
        Tcp { #[pin] inner: TcpStream },
        /// TLS negotiated over TCP when the configuration requests it.
        Tls { #[pin] inner: TlsStream<TcpStream> },
    }
}

impl TransportStream {
    pub fn tcp(inner: TcpStream) -> Self {
        TransportStream::Tcp { inner }
    }

    pub fn tls(inner: TlsStream<TcpStream>) -> Self {
        TransportStream::Tls { inner }
    }

    /// Whether the transport's traffic is encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, TransportStream::Tls { .. })
    }
}

impl AsyncRead for TransportStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            TransportStreamProj::Tcp { inner } => inner.poll_read(cx, buf),
            TransportStreamProj::Tls { inner } => inner.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TransportStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            TransportStreamProj::Tcp { inner } => inner.poll_write(cx, buf),
            TransportStreamProj::Tls { inner } => inner.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            TransportStreamProj::Tcp { inner } => inner.poll_flush(cx),
            TransportStreamProj::Tls { inner } => inner.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            TransportStreamProj::Tcp { inner } => inner.poll_shutdown(cx),
            TransportStreamProj::Tls { inner } => inner.poll_shutdown(cx),
        }
    }
}
