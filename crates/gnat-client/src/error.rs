//! Client errors.

use gnat_core::GateError;
use gnat_protocol::ProtocolError;
use gnat_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by connection operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The stream failed. Fatal for the connection.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed data on the wire, or an operation that cannot be encoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server did not answer `PING` in time. The connection stays usable.
    #[error("Flush timed out after {0:?}")]
    FlushTimeout(Duration),

    /// The connection was closed or broke earlier.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Transport(TransportError::Io(e))
    }
}

impl From<GateError> for ClientError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Timeout(d) => ClientError::FlushTimeout(d),
        }
    }
}

impl ClientError {
    /// Whether the connection can still be used after this error.
    ///
    /// Operations rejected while encoding never reach the writer and leave the
    /// connection open.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::FlushTimeout(_)
                | ClientError::Protocol(
                    ProtocolError::InvalidToken { .. } | ProtocolError::PayloadTooLarge(_)
                )
        )
    }
}
