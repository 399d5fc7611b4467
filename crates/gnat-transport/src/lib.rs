//! # gnat-transport
//!
//! Transport abstraction layer for the gnat client.
//!
//! The protocol engine runs over any duplex byte stream. This crate provides the
//! [`Dialer`] trait that opens one and a TCP implementation.
//!
//! ```rust,ignore
//! use gnat_transport::{Dialer, TcpDialer};
//!
//! let stream = TcpDialer::default().dial("127.0.0.1:4222").await?;
//! ```

pub mod traits;

#[cfg(feature = "tcp")]
pub mod tcp;

pub use traits::{BoxedStream, ByteStream, ConnectionId, Dialer, TransportError};

#[cfg(feature = "tcp")]
pub use tcp::{TcpConfig, TcpDialer};
