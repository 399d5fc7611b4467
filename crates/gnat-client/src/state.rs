//! Connection lifecycle state.
//!
//! ```text
//! Open ──close()──▶ Closing ──▶ Closed
//!   │
//!   └──read/write failure──▶ Broken
//! ```
//!
//! Closed and Broken are terminal.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Open = 0,
    Closing = 1,
    Closed = 2,
    Broken = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            2 => ConnectionState::Closed,
            _ => ConnectionState::Broken,
        }
    }

    /// Whether operations are still accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self == ConnectionState::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Broken => "broken",
        };
        f.write_str(s)
    }
}

/// Atomic holder for a [`ConnectionState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Open as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Open → Closing. Returns `false` if the connection was not open.
    pub(crate) fn begin_close(&self) -> bool {
        self.transition(ConnectionState::Open, ConnectionState::Closing)
    }

    /// Closing → Closed.
    pub(crate) fn finish_close(&self) -> bool {
        self.transition(ConnectionState::Closing, ConnectionState::Closed)
    }

    /// Open → Broken. Returns `false` if the connection was already leaving Open.
    pub(crate) fn mark_broken(&self) -> bool {
        self.transition(ConnectionState::Open, ConnectionState::Broken)
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
