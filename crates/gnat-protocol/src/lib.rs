//! # gnat-protocol
//!
//! Wire codec for the gnat publish/subscribe client.
//!
//! The protocol is text based: each operation is one CRLF-terminated control
//! line, and `PUB`/`MSG` are followed by a length-prefixed raw payload.
//!
//! ## Operations
//!
//! - Client to server: `CONNECT`, `PUB`, `SUB`, `UNSUB`, `PING`, `PONG`
//! - Server to client: `INFO`, `MSG`, `PING`, `PONG`, `+OK`, `-ERR`
//!
//! ## Example
//!
//! ```rust
//! use bytes::{Bytes, BytesMut};
//! use gnat_protocol::{codec, ClientOp, Frame};
//!
//! let op = ClientOp::publish("orders.new", None, Bytes::from_static(b"hello"));
//! let encoded = codec::encode(&op).unwrap();
//! assert_eq!(&encoded[..], b"PUB orders.new  5\r\nhello\r\n");
//!
//! let mut buf = BytesMut::from(&b"MSG orders.new 1 5\r\nhello\r\n"[..]);
//! let frame = codec::decode_from(&mut buf).unwrap().unwrap();
//! assert!(matches!(frame, Frame::Msg { sid: 1, .. }));
//! ```

pub mod codec;
pub mod frames;
pub mod info;

pub use codec::{decode, decode_from, encode, ProtocolError};
pub use frames::{ClientOp, Frame, FrameKind};
pub use info::{ConnectOptions, ServerInfo};
