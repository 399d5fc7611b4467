//! Client configuration.

use gnat_core::gate::{DEFAULT_PROBE_TIMEOUT, DEFAULT_TICKET_CAPACITY};
use gnat_protocol::ConnectOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client name advertised in `CONNECT`.
    #[serde(default)]
    pub name: Option<String>,

    /// Ask the server to acknowledge every operation with `+OK`.
    #[serde(default)]
    pub verbose: bool,

    /// Ask the server for strict subject checking.
    #[serde(default)]
    pub pedantic: bool,

    /// How long `flush` waits for `PONG`, in milliseconds.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Acknowledgments buffered before extras are dropped.
    #[serde(default = "default_pong_capacity")]
    pub pong_capacity: usize,

    /// Initial read buffer capacity in bytes.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Write buffer capacity in bytes.
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
}

fn default_flush_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_pong_capacity() -> usize {
    DEFAULT_TICKET_CAPACITY
}

fn default_read_buffer_size() -> usize {
    32 * 1024
}

fn default_write_buffer_size() -> usize {
    32 * 1024
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: None,
            verbose: false,
            pedantic: false,
            flush_timeout_ms: default_flush_timeout_ms(),
            pong_capacity: default_pong_capacity(),
            read_buffer_size: default_read_buffer_size(),
            write_buffer_size: default_write_buffer_size(),
        }
    }
}

impl ClientConfig {
    /// Set the client name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the flush timeout.
    #[must_use]
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Get the flush timeout.
    #[must_use]
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Build the `CONNECT` options for this configuration.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            verbose: self.verbose,
            pedantic: self.pedantic,
            name: self.name.clone(),
            ..ConnectOptions::default()
        }
    }
}
