//! Frame types for the gnat protocol.
//!
//! The protocol is line oriented: every operation is one CRLF-terminated ASCII
//! control line, optionally followed by a payload of declared length.
//! [`Frame`] covers what the server sends, [`ClientOp`] what the client sends.

use bytes::Bytes;
use std::fmt;

use crate::info::{ConnectOptions, ServerInfo};

/// Frame kind identifiers, used for diagnostics and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Info,
    Msg,
    Ping,
    Pong,
    Ok,
    Err,
    Unknown,
}

impl FrameKind {
    /// The protocol verb for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Info => "INFO",
            FrameKind::Msg => "MSG",
            FrameKind::Ping => "PING",
            FrameKind::Pong => "PONG",
            FrameKind::Ok => "+OK",
            FrameKind::Err => "-ERR",
            FrameKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server information, sent on connect and whenever it changes.
    Info(ServerInfo),

    /// A message delivered to one of our subscriptions.
    Msg {
        /// Subject the message was published to.
        subject: String,
        /// Reply subject, if the publisher set one.
        reply_to: Option<String>,
        /// Subscription identifier the message is addressed to.
        sid: u64,
        /// Raw payload bytes.
        payload: Bytes,
    },

    /// Liveness probe from the server; must be answered with `PONG`.
    Ping,

    /// Answer to one of our `PING`s.
    Pong,

    /// Acknowledgment sent in verbose mode.
    Ok,

    /// Server-reported error.
    Err(String),

    /// A control verb this client does not understand.
    Unknown(String),
}

impl Frame {
    /// Get the frame kind.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Info(_) => FrameKind::Info,
            Frame::Msg { .. } => FrameKind::Msg,
            Frame::Ping => FrameKind::Ping,
            Frame::Pong => FrameKind::Pong,
            Frame::Ok => FrameKind::Ok,
            Frame::Err(_) => FrameKind::Err,
            Frame::Unknown(_) => FrameKind::Unknown,
        }
    }

    /// Create a new Msg frame.
    #[must_use]
    pub fn msg(
        subject: impl Into<String>,
        sid: u64,
        reply_to: Option<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Frame::Msg {
            subject: subject.into(),
            reply_to,
            sid,
            payload: payload.into(),
        }
    }

    /// Create a new Err frame.
    #[must_use]
    pub fn err(text: impl Into<String>) -> Self {
        Frame::Err(text.into())
    }
}

/// An operation sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOp {
    /// Handshake, sent once before anything else.
    Connect(ConnectOptions),

    /// Publish a payload to a subject.
    Pub {
        subject: String,
        reply_to: Option<String>,
        payload: Bytes,
    },

    /// Register interest in a subject.
    Sub {
        subject: String,
        queue: Option<String>,
        sid: u64,
    },

    /// Drop a subscription, optionally after `max_msgs` more messages.
    Unsub { sid: u64, max_msgs: Option<u64> },

    Ping,
    Pong,
}

impl ClientOp {
    /// Create a new Pub operation.
    #[must_use]
    pub fn publish(
        subject: impl Into<String>,
        reply_to: Option<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        ClientOp::Pub {
            subject: subject.into(),
            reply_to,
            payload: payload.into(),
        }
    }

    /// Create a new Sub operation.
    #[must_use]
    pub fn subscribe(subject: impl Into<String>, queue: Option<String>, sid: u64) -> Self {
        ClientOp::Sub {
            subject: subject.into(),
            queue,
            sid,
        }
    }

    /// Create a new Unsub operation.
    #[must_use]
    pub fn unsubscribe(sid: u64) -> Self {
        ClientOp::Unsub {
            sid,
            max_msgs: None,
        }
    }

    /// The protocol verb for this operation.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            ClientOp::Connect(_) => "CONNECT",
            ClientOp::Pub { .. } => "PUB",
            ClientOp::Sub { .. } => "SUB",
            ClientOp::Unsub { .. } => "UNSUB",
            ClientOp::Ping => "PING",
            ClientOp::Pong => "PONG",
        }
    }
}
