//! Diagnostics sink for decoded frames.
//!
//! The read loop reports what it sees here. Sinks are observers only; nothing
//! they do feeds back into the protocol engine.

use gnat_protocol::FrameKind;
use std::fmt;
use tracing::{debug, error, info, trace, warn, Level};

/// Receives `(level, frame kind, details)` records from the read loop.
pub trait DiagnosticsSink: Send + Sync {
    /// Record one event.
    fn record(&self, level: Level, kind: FrameKind, details: fmt::Arguments<'_>);
}

/// Forwards records to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, level: Level, kind: FrameKind, details: fmt::Arguments<'_>) {
        if level == Level::ERROR {
            error!(frame = %kind, "{}", details);
        } else if level == Level::WARN {
            warn!(frame = %kind, "{}", details);
        } else if level == Level::INFO {
            info!(frame = %kind, "{}", details);
        } else if level == Level::DEBUG {
            debug!(frame = %kind, "{}", details);
        } else {
            trace!(frame = %kind, "{}", details);
        }
    }
}
