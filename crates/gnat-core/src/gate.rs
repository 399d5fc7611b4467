//! Flush synchronization gate.
//!
//! A flush writes `PING` and waits for the server's `PONG`. The gate is a bounded
//! signal slot shared by the whole connection: the read loop releases it on every
//! acknowledgment, and whichever flush currently holds the ticket is woken.
//!
//! Acknowledgments are not paired with the probe that solicited them. A late
//! `PONG` for a timed-out flush can release the next flush early.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

/// Default time to wait for an acknowledgment.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of acknowledgments buffered before extras are dropped.
pub const DEFAULT_TICKET_CAPACITY: usize = 2;

/// Gate errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// No acknowledgment arrived in time.
    #[error("No acknowledgment within {0:?}")]
    Timeout(Duration),
}

/// Single-slot signal between the read loop and flushing callers.
#[derive(Debug)]
pub struct SyncGate {
    signals: mpsc::Sender<()>,
    waiter: Mutex<mpsc::Receiver<()>>,
}

impl SyncGate {
    /// Create a gate with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TICKET_CAPACITY)
    }

    /// Create a gate buffering up to `capacity` acknowledgments (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (signals, waiter) = mpsc::channel(capacity.max(1));
        Self {
            signals,
            waiter: Mutex::new(waiter),
        }
    }

    /// Record an acknowledgment.
    ///
    /// Never blocks. Returns `false` if the slot was full and the signal dropped.
    pub fn release(&self) -> bool {
        match self.signals.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                trace!("Gate full, dropping acknowledgment");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }

    /// Take the waiter slot ahead of sending a probe.
    ///
    /// Acknowledgments buffered before this call are discarded, so the ticket only
    /// completes on a release that happens after it was taken. Concurrent callers
    /// queue here.
    pub async fn acquire(&self) -> ProbeTicket<'_> {
        let mut waiter = self.waiter.lock().await;

        let mut stale = 0usize;
        while waiter.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!(stale, "Discarded stale acknowledgments");
        }

        ProbeTicket { waiter }
    }
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

/// An outstanding probe. Holding it excludes other waiters.
#[derive(Debug)]
pub struct ProbeTicket<'a> {
    waiter: MutexGuard<'a, mpsc::Receiver<()>>,
}

impl ProbeTicket<'_> {
    /// Wait for the next release, up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Timeout` if nothing is released in time.
    pub async fn wait(mut self, timeout: Duration) -> Result<(), GateError> {
        match tokio::time::timeout(timeout, self.waiter.recv()).await {
            Ok(Some(())) => Ok(()),
            // The gate owns the sender, so the channel cannot close under us.
            Ok(None) | Err(_) => Err(GateError::Timeout(timeout)),
        }
    }
}
