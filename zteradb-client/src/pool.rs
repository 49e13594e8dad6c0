//! Connection pool and query dispatch.
//!
//! The pool owns every transport it creates. Transports live in one of two
//! disjoint sets, `idle` or `in_use`, keyed by transport identity; a
//! transport is loaned (never transferred) to a caller for the duration of
//! one query and must come back on every exit path.

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{Transport, TransportOptions};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zteradb_protocol::message::{
    DisconnectRequest, PingRequest, QueryRequest, ResponseCode, ResponseFrame,
};
use zteradb_query::Query;

/// A pool of authenticated transports to one ZTeraDB endpoint.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .finish()
    }
}

struct PoolInner {
    host: String,
    port: u16,
    config: ClientConfig,
    auth: Authenticator,
    options: TransportOptions,
    state: Mutex<PoolState>,
    closed: AtomicBool,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Transport>,
    in_use: HashSet<u64>,
}

impl Pool {
    /// Validates the configuration, then eagerly opens and authenticates
    /// `pool.min` transports. Transports that fail to connect are skipped
    /// (the pool may start smaller than `min`); authentication failures
    /// propagate.
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::Value(e.to_string()))?;

        let host = host.into();
        let options = TransportOptions {
            use_tls: config.use_tls,
            verify_tls_host: config.verify_tls_host,
            ..Default::default()
        };
        let auth = Authenticator::new(&config);

        let inner = Arc::new(PoolInner {
            host,
            port,
            auth,
            options,
            config,
            state: Mutex::new(PoolState::default()),
            closed: AtomicBool::new(false),
        });

        for _ in 0..inner.config.options.connection_pool.min {
            match inner.open_authenticated().await {
                Ok(transport) => inner.state.lock().idle.push(transport),
                Err(err @ ClientError::Auth(_)) => return Err(err),
                Err(err) => tracing::warn!("skipping pool warmup transport: {err}"),
            }
        }

        tracing::debug!(
            idle = inner.state.lock().idle.len(),
            "pool connected to {}:{}",
            inner.host,
            inner.port
        );

        Ok(Self { inner })
    }

    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.inner.state.lock().in_use.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Runs a query, returning its streamed rows.
    pub async fn run(&self, query: &Query) -> Result<RowStream, ClientError> {
        if self.is_closed() {
            return Err(ClientError::PoolClosed);
        }

        let document = query.generate()?;
        let mut transport = self.inner.acquire().await?;

        let request = QueryRequest::new(
            document,
            self.inner.config.database_id.clone(),
            self.inner.config.env.as_str(),
        );
        if let Err(err) = transport.send_json(&request).await {
            self.inner.discard(transport);
            return Err(err);
        }

        Ok(RowStream {
            pool: Arc::clone(&self.inner),
            transport: Some(transport),
            finished: false,
        })
    }

    /// Runs a query and collects every row.
    pub async fn fetch_all(&self, query: &Query) -> Result<Vec<Value>, ClientError> {
        let mut stream = self.run(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Runs a query that must produce at least one row and returns the
    /// first. An empty stream is [`ClientError::NoResponseData`].
    pub async fn fetch_one(&self, query: &Query) -> Result<Value, ClientError> {
        let mut stream = self.run(query).await?;
        match stream.next().await {
            Some(row) => row,
            None => Err(ClientError::NoResponseData),
        }
    }

    /// Liveness check over a pooled transport.
    pub async fn ping(&self) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::PoolClosed);
        }

        let mut transport = self.inner.acquire().await?;
        let result = ping_on(&mut transport).await;
        match result {
            Ok(()) => {
                self.inner.release(transport);
                Ok(())
            }
            Err(err) => {
                self.inner.discard(transport);
                Err(err)
            }
        }
    }

    /// Closes every idle transport (best-effort DISCONNECT first) and marks
    /// the pool closed, so loaned transports are destroyed at release rather
    /// than re-pooled. Idempotent; per-transport errors are swallowed so all
    /// transports are attempted.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let idle = {
            let mut state = self.inner.state.lock();
            std::mem::take(&mut state.idle)
        };

        for mut transport in idle {
            let _ = transport.send_json(&DisconnectRequest::new()).await;
            transport.close();
        }

        tracing::debug!("pool closed");
    }
}

async fn ping_on(transport: &mut Transport) -> Result<(), ClientError> {
    transport.send_json(&PingRequest::new()).await?;
    // A terminator here is a well-formed frame that simply is not PONG;
    // it fails the ping like any other unexpected response code.
    let frame = match transport.receive_next().await? {
        Some(frame) => frame,
        None => ResponseFrame::new(ResponseCode::QueryComplete, None),
    };
    if frame.code() == Some(ResponseCode::Pong) {
        return Ok(());
    }
    Err(ClientError::Query {
        code: frame.response_code,
        data: frame.data.unwrap_or(Value::Null),
    })
}

impl PoolInner {
    /// Opens a transport and performs the handshake on it.
    async fn open_authenticated(&self) -> Result<Transport, ClientError> {
        let mut transport = Transport::open(&self.host, self.port, &self.options).await?;
        transport.send_json(&self.auth.handshake_request()).await?;
        let response = transport.receive_handshake().await?;
        let token = self.auth.parse_response(&response)?;
        transport.set_token(token);
        tracing::debug!(transport = transport.id(), "transport authenticated");
        Ok(transport)
    }

    /// Takes an idle transport (replacing it when its token has aged out)
    /// or opens a new one within the configured ceiling. The chosen
    /// transport moves to `in_use`.
    async fn acquire(&self) -> Result<Transport, ClientError> {
        let candidate = self.state.lock().idle.pop();

        let transport = match candidate {
            Some(mut transport) => {
                let expired = transport
                    .token()
                    .map(|token| token.is_expired())
                    .unwrap_or(true);
                if expired {
                    tracing::debug!(
                        transport = transport.id(),
                        "server token expired; reconnecting"
                    );
                    transport.close();
                    self.open_authenticated().await?
                } else {
                    transport
                }
            }
            None => {
                let max = self.config.options.connection_pool.max;
                if max > 0 {
                    let total = {
                        let state = self.state.lock();
                        state.idle.len() + state.in_use.len()
                    };
                    if total >= max as usize {
                        return Err(ClientError::PoolExhausted { max });
                    }
                }
                self.open_authenticated().await?
            }
        };

        self.state.lock().in_use.insert(transport.id());
        Ok(transport)
    }

    /// Returns a loaned transport to the idle set, or destroys it when the
    /// pool has been closed in the meantime.
    fn release(&self, mut transport: Transport) {
        let mut state = self.state.lock();
        state.in_use.remove(&transport.id());
        if self.closed.load(Ordering::SeqCst) || transport.is_closed() {
            drop(state);
            transport.close();
        } else {
            state.idle.push(transport);
        }
    }

    /// Removes a loaned transport from the pool entirely and closes it.
    fn discard(&self, mut transport: Transport) {
        self.state.lock().in_use.remove(&transport.id());
        transport.close();
    }
}

/// Streamed rows of one query. Finite, forward-only, non-restartable: once
/// the terminator has been seen, further calls yield nothing.
pub struct RowStream {
    pool: Arc<PoolInner>,
    transport: Option<Transport>,
    finished: bool,
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("finished", &self.finished)
            .finish()
    }
}

impl RowStream {
    /// The next row, or `None` once the stream has ended.
    ///
    /// Frames carrying QUERY_DATA yield their `data`. Any other
    /// non-terminator code removes the transport from the pool and fails
    /// the stream with the server's payload.
    pub async fn next(&mut self) -> Option<Result<Value, ClientError>> {
        if self.finished {
            return None;
        }
        let transport = self.transport.as_mut()?;

        match transport.receive_next().await {
            Ok(Some(frame)) => {
                if frame.is_data() {
                    Some(Ok(frame.data.unwrap_or(Value::Null)))
                } else {
                    self.finished = true;
                    let err = ClientError::Query {
                        code: frame.response_code,
                        data: frame.data.unwrap_or(Value::Null),
                    };
                    if let Some(transport) = self.transport.take() {
                        self.pool.discard(transport);
                    }
                    Some(Err(err))
                }
            }
            Ok(None) => {
                self.finished = true;
                if let Some(transport) = self.transport.take() {
                    self.pool.release(transport);
                }
                None
            }
            Err(err) => {
                self.finished = true;
                if let Some(transport) = self.transport.take() {
                    self.pool.discard(transport);
                }
                Some(Err(err))
            }
        }
    }
}

impl Drop for RowStream {
    // Abandoning the stream before the terminator closes the transport:
    // the protocol has no in-band abort message.
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            self.pool.discard(transport);
        }
    }
}
