//! Transport abstraction traits for gnat.
//!
//! The client only needs an already-open duplex byte stream. A [`Dialer`] opens
//! one; anything implementing `AsyncRead + AsyncWrite` (a TCP socket, an
//! in-memory duplex pipe in tests) can stand in for it.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Unique identifier for a connection, used to tag log records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let n = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}", n))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection attempt timed out.
    #[error("Connection to {0} timed out")]
    Timeout(String),

    /// Failed to open the connection.
    #[error("Dial {addr} failed: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A duplex byte stream the client can run the protocol over.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A boxed byte stream.
pub type BoxedStream = Box<dyn ByteStream>;

/// Something that can open a stream to a server address.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a stream to `addr`.
    async fn dial(&self, addr: &str) -> Result<BoxedStream, TransportError>;

    /// Get the transport name (e.g., "tcp").
    fn name(&self) -> &'static str;
}
