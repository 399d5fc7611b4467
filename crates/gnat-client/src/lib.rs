//! # gnat-client
//!
//! Asynchronous client for the gnat publish/subscribe protocol.
//!
//! A [`Connection`] runs over any duplex byte stream. It writes `CONNECT` on
//! startup, then lets callers publish, subscribe with a handler, unsubscribe,
//! and flush (a `PING`/`PONG` round trip). A background task reads server
//! frames, dispatches messages to handlers, and answers keep-alives.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gnat_client::{ClientConfig, Connection};
//! use gnat_transport::TcpDialer;
//!
//! let conn = Connection::connect(&TcpDialer::default(), "127.0.0.1:4222", ClientConfig::default()).await?;
//! conn.subscribe("hello", None, |subject: &str, _reply: Option<&str>, payload: &bytes::Bytes| {
//!     println!("{subject}: {payload:?}");
//! })
//! .await?;
//! conn.publish("hello", None, "world").await?;
//! conn.flush().await?;
//! conn.close().await?;
//! ```

pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod state;

mod handshake;
mod read_loop;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use connection::{Connection, ConnectionBuilder};
pub use diagnostics::{DiagnosticsSink, TracingSink};
pub use error::ClientError;
pub use state::ConnectionState;

pub use gnat_core::Sid;
pub use gnat_protocol::{ConnectOptions, ServerInfo};
