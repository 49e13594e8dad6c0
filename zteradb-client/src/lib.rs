//! # zteradb-client
//!
//! Async client library for ZTeraDB.
//!
//! This crate provides:
//! - A pool of authenticated TCP (optionally TLS) transports
//! - The handshake and token lifecycle
//! - Streamed query execution yielding rows as they arrive
//!
//! The usual entry point is [`Pool::connect`]:
//!
//! ```no_run
//! use zteradb_client::{ClientConfig, Pool};
//! use zteradb_query::{Env, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("ck", "ak", "sk", "db-1", Env::Dev);
//!     let pool = Pool::connect("127.0.0.1", 7600, config).await?;
//!
//!     let query = Query::new("user").select();
//!     let mut rows = pool.run(&query).await?;
//!     while let Some(row) = rows.next().await {
//!         println!("{}", row?);
//!     }
//!
//!     pool.close().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod pool;
pub mod stream;
pub mod tls;
pub mod transport;

pub use auth::{Authenticator, ServerToken};
pub use config::{ClientConfig, ConfigError, PoolConfig, ResponseDataType};
pub use error::ClientError;
pub use pool::{Pool, RowStream};
pub use transport::{Transport, TransportOptions};
