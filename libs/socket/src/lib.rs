//! # Exchange Socket Transport
//!
//! Forwards request/response exchanges to another process over TCP, Unix
//! stream, UDP or Unix datagram sockets.
//!
//! ## Architecture
//!
//! ```text
//! SocketClient ─ pool of ClientConnection ─┐            ┌─ SocketServer ─ RequestHandler
//!                                           │  socket    │
//!   Exchange ⇄ codec ⇄ model ⇄ serializer ⇄ Messenger ⇄ Messenger ⇄ serializer ⇄ model ⇄ codec ⇄ Exchange
//! ```
//!
//! Everything is chosen by one address string,
//! `"<data-model>:<serializer>:<family>:<address>"`:
//!
//! - data model: `raw` (HTTP/1.1 bytes) or `structured` (field by field)
//! - serializer: `native`, `bincode` or `json`
//! - family: `unix`, `unixgram`, `udp` or `tcp`
//!
//! ## Example
//!
//! ```no_run
//! use exchange::{Exchange, Method, Request, Uri};
//! use exchange_socket::{SocketClient, SocketConfig, SocketServer};
//!
//! # async fn run() -> exchange_socket::Result<()> {
//! let config = SocketConfig::new("raw:native:unix:/tmp/exchange.sock");
//!
//! let server = SocketServer::new(
//!     |exchange: &mut Exchange| -> anyhow::Result<()> {
//!         exchange.response.set_body("hello");
//!         Ok(())
//!     },
//!     config.clone(),
//! )?;
//! server.start().await?;
//!
//! let client = SocketClient::connect(config).await?;
//! let mut exchange = Exchange::new(Request::new(Method::GET, Uri::from_static("/")));
//! client.send_and_receive(&mut exchange).await?;
//! assert_eq!(&exchange.response.body[..], b"hello");
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod serializer;
pub mod server;
pub mod transports;

pub use address::{AddressSpec, DataModelKind, Family, SerializerKind};
pub use client::{ClientConnection, ConnectionGuard, PoolStats, SocketClient};
pub use config::SocketConfig;
pub use error::{Result, SocketError, TransportError};
pub use server::{RequestHandler, SocketServer};
