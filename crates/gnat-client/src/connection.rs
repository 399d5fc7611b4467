//! Connection facade.
//!
//! A [`Connection`] is a cheap, cloneable handle. All clones share one writer,
//! one subscription registry and one flush gate, and a single background task
//! reads and dispatches incoming frames (see [`crate::read_loop`]).
//!
//! Every write (publish, subscribe, unsubscribe, the flush probe and the read
//! loop's keep-alive `PONG`) goes through the same writer mutex. Operations are
//! encoded before the lock is taken, so the critical section is only the
//! write and flush of one complete operation.

use bytes::Bytes;
use gnat_core::{Sid, SubscriptionRegistry, SyncGate};
use gnat_protocol::{codec, ClientOp, ServerInfo};
use gnat_transport::{BoxedStream, ByteStream, ConnectionId, Dialer, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter, WriteHalf};
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::error::ClientError;
use crate::handshake;
use crate::metrics;
use crate::read_loop;
use crate::state::{ConnectionState, StateCell};

type Writer = BufWriter<WriteHalf<BoxedStream>>;

/// State shared by every handle and the read loop.
pub(crate) struct Shared {
    pub(crate) id: ConnectionId,
    pub(crate) config: ClientConfig,
    writer: Mutex<Writer>,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) gate: SyncGate,
    pub(crate) state: StateCell,
    pub(crate) server_info: watch::Sender<Option<ServerInfo>>,
    pub(crate) diagnostics: Arc<dyn DiagnosticsSink>,
    /// Wakes the read loop when the connection is closed from our side.
    pub(crate) shutdown: Notify,
    /// Set once the read loop has exited; pending flushes give up on it.
    pub(crate) terminated: watch::Sender<bool>,
}

impl Shared {
    /// Write one encoded operation and flush it.
    pub(crate) async fn write_bytes(&self, data: &[u8]) -> Result<(), ClientError> {
        let result = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(data).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        result.map_err(|e| self.write_failed(e))
    }

    /// Encode and write one operation.
    pub(crate) async fn send_op(&self, op: &ClientOp) -> Result<(), ClientError> {
        let data = codec::encode(op)?;
        self.write_bytes(&data).await
    }

    /// A partial write leaves the stream unframed; nothing can follow it.
    fn write_failed(&self, e: std::io::Error) -> ClientError {
        if self.state.mark_broken() {
            warn!(connection = %self.id, error = %e, "Write failed, connection is broken");
            self.shutdown.notify_one();
        }
        TransportError::Io(e).into()
    }

    /// Resolves once the read loop has exited.
    async fn wait_terminated(&self) {
        let mut terminated = self.terminated.subscribe();
        loop {
            let done = *terminated.borrow_and_update();
            if done || terminated.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Builds a [`Connection`] with non-default collaborators.
pub struct ConnectionBuilder {
    config: ClientConfig,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ConnectionBuilder {
    /// Start from a configuration. Diagnostics go to `tracing` by default.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// Send read loop diagnostics to `sink`.
    #[must_use]
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Dial `addr` and start the protocol on the new stream.
    ///
    /// # Errors
    ///
    /// Returns an error if dialing or the handshake fails.
    pub async fn connect(self, dialer: &dyn Dialer, addr: &str) -> Result<Connection, ClientError> {
        debug!(addr = %addr, transport = dialer.name(), "Dialing");
        let stream = dialer.dial(addr).await?;
        self.start_boxed(stream).await
    }

    /// Start the protocol on an already-open stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake cannot be written.
    pub async fn start<S>(self, stream: S) -> Result<Connection, ClientError>
    where
        S: ByteStream + 'static,
    {
        self.start_boxed(Box::new(stream)).await
    }

    async fn start_boxed(self, stream: BoxedStream) -> Result<Connection, ClientError> {
        let (reader, writer) = tokio::io::split(stream);
        let mut writer = BufWriter::with_capacity(self.config.write_buffer_size, writer);
        handshake::send_connect(&mut writer, &self.config.connect_options()).await?;

        let (server_info, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            id: ConnectionId::generate(),
            gate: SyncGate::with_capacity(self.config.pong_capacity),
            config: self.config,
            writer: Mutex::new(writer),
            registry: SubscriptionRegistry::new(),
            state: StateCell::new(),
            server_info,
            diagnostics: self.diagnostics,
            shutdown: Notify::new(),
            terminated: watch::channel(false).0,
        });

        read_loop::spawn(reader, Arc::clone(&shared));
        info!(connection = %shared.id, "Connected");

        Ok(Connection {
            _last_handle: Arc::new(LastHandle {
                shared: Arc::clone(&shared),
            }),
            shared,
        })
    }
}

/// A client connection.
///
/// Handlers passed to [`Connection::subscribe`] run on the read loop task, one
/// at a time. A handler that blocks delays every message behind it, on every
/// subscription; hand work off to another task if it may take long. Writes are
/// unaffected: publishing and subscribing keep working while a handler runs.
///
/// Dropping the last handle closes the connection without flushing. A handler
/// that captures a clone of its own connection keeps it alive until `close`.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    _last_handle: Arc<LastHandle>,
}

/// Shared by user handles only; the read loop holds `Shared` directly.
struct LastHandle {
    shared: Arc<Shared>,
}

impl Drop for LastHandle {
    fn drop(&mut self) {
        let shared = &self.shared;
        if shared.state.begin_close() {
            shared.shutdown.notify_one();
            shared.state.finish_close();
            debug!(connection = %shared.id, "Last handle dropped, connection closed");
        }
    }
}

impl Connection {
    /// Dial `addr` with default collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if dialing or the handshake fails.
    pub async fn connect(
        dialer: &dyn Dialer,
        addr: &str,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        ConnectionBuilder::new(config).connect(dialer, addr).await
    }

    /// Run the protocol over an already-open stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake cannot be written.
    pub async fn from_stream<S>(stream: S, config: ClientConfig) -> Result<Self, ClientError>
    where
        S: ByteStream + 'static,
    {
        ConnectionBuilder::new(config).start(stream).await
    }

    /// Get the connection identifier used in log records.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.shared.id
    }

    /// Get the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Latest `INFO` received from the server, if any.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.shared.server_info.borrow().clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Publish `payload` to `subject`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not open, the subject or reply are
    /// not valid tokens, or the write fails.
    pub async fn publish(
        &self,
        subject: &str,
        reply_to: Option<&str>,
        payload: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.ensure_open()?;

        let payload = payload.into();
        let size = payload.len();
        let op = ClientOp::publish(subject, reply_to.map(str::to_string), payload);
        self.shared.send_op(&op).await?;

        metrics::record_message(size, "outbound");
        trace!(connection = %self.shared.id, subject = %subject, bytes = size, "Published");
        Ok(())
    }

    /// Subscribe to `subject`, optionally in a queue group.
    ///
    /// Returns the subscription id. Ids start at 1 and increase by one with each
    /// successful call. The handler is registered before the `SUB` line is
    /// flushed so no early message is lost, and removed again if the write fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not open, the subject or queue are
    /// invalid, or the write fails. A failed write leaves nothing registered
    /// under the allocated id and marks the connection broken.
    pub async fn subscribe<F>(
        &self,
        subject: &str,
        queue: Option<&str>,
        handler: F,
    ) -> Result<Sid, ClientError>
    where
        F: Fn(&str, Option<&str>, &Bytes) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        codec::validate_subject(subject)?;
        codec::validate_queue(queue)?;

        let shared = &self.shared;
        let queue = queue.filter(|q| !q.is_empty()).map(str::to_string);

        // Allocation and write happen under the writer lock so ids reach the
        // wire in order.
        let mut writer = shared.writer.lock().await;
        let sid = shared.registry.allocate_sid();
        let line = codec::encode(&ClientOp::subscribe(subject, queue.clone(), sid))?;

        shared
            .registry
            .insert(sid, subject, queue.clone(), Arc::new(handler));

        let written = match writer.write_all(&line).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        drop(writer);

        if let Err(e) = written {
            shared.registry.remove(sid);
            return Err(shared.write_failed(e));
        }

        metrics::set_active_subscriptions(shared.registry.len());
        debug!(
            connection = %shared.id,
            sid,
            subject = %subject,
            queue = ?queue,
            "Subscribed"
        );
        Ok(sid)
    }

    /// Drop a subscription and tell the server.
    ///
    /// Unknown or already removed ids are ignored and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not open or the write fails.
    pub async fn unsubscribe(&self, sid: Sid) -> Result<(), ClientError> {
        self.ensure_open()?;

        if self.shared.registry.remove(sid).is_none() {
            return Ok(());
        }
        metrics::set_active_subscriptions(self.shared.registry.len());

        self.shared.send_op(&ClientOp::unsubscribe(sid)).await?;
        debug!(connection = %self.shared.id, sid, "Unsubscribed");
        Ok(())
    }

    /// Round-trip a `PING` and wait for the server's `PONG`.
    ///
    /// Everything written before this call has been processed by the server when
    /// it returns `Ok`. Any acknowledgment arriving while this call waits
    /// releases it, including a late one meant for an earlier, timed-out flush.
    ///
    /// The timeout runs from the moment of the call, including time spent
    /// queued behind other flushes.
    ///
    /// # Errors
    ///
    /// Returns `FlushTimeout` if no acknowledgment arrives within the configured
    /// timeout; the connection remains usable. Returns `ConnectionClosed` as soon
    /// as the connection ends while waiting. Other errors are fatal.
    pub async fn flush(&self) -> Result<(), ClientError> {
        self.ensure_open()?;

        let timeout = self.shared.config.flush_timeout();
        let deadline = Instant::now() + timeout;

        let result = tokio::select! {
            result = self.probe(deadline, timeout) => result,
            () = self.shared.wait_terminated() => Err(ClientError::ConnectionClosed),
        };

        if let Err(ClientError::FlushTimeout(_)) = result {
            metrics::record_flush_timeout();
            warn!(connection = %self.shared.id, ?timeout, "Flush timed out");
        }
        result
    }

    /// Queue for the gate, write `PING`, and wait for the acknowledgment, all
    /// before `deadline`. The deadline never cuts the write short.
    async fn probe(&self, deadline: Instant, timeout: Duration) -> Result<(), ClientError> {
        let ticket = tokio::time::timeout_at(deadline, self.shared.gate.acquire())
            .await
            .map_err(|_| ClientError::FlushTimeout(timeout))?;

        self.ensure_open()?;
        self.shared.send_op(&ClientOp::Ping).await?;

        match tokio::time::timeout_at(deadline, ticket.wait(timeout)).await {
            Ok(acknowledged) => acknowledged.map_err(ClientError::from),
            Err(_) => Err(ClientError::FlushTimeout(timeout)),
        }
    }

    /// Flush buffered output, release the transport, and stop the read loop.
    ///
    /// Calling `close` on a connection that is not open does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered output could not be flushed. The connection
    /// is closed either way.
    pub async fn close(&self) -> Result<(), ClientError> {
        let shared = &self.shared;
        if !shared.state.begin_close() {
            return Ok(());
        }

        let flushed = {
            let mut writer = shared.writer.lock().await;
            let flushed = writer.flush().await;
            if let Err(e) = writer.shutdown().await {
                debug!(connection = %shared.id, error = %e, "Shutdown after close failed");
            }
            flushed
        };

        shared.shutdown.notify_one();
        shared.state.finish_close();
        info!(connection = %shared.id, "Connection closed");

        flushed.map_err(|e| TransportError::Io(e).into())
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.shared.state.get().is_open() {
            Ok(())
        } else {
            Err(ClientError::ConnectionClosed)
        }
    }
}
