//! In-memory server for connection tests.

use bytes::BytesMut;
use gnat_protocol::{codec, ClientOp, Frame};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionBuilder};
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::state::ConnectionState;

/// Server end of a duplex pipe, speaking just enough of the protocol.
pub(crate) struct MockServer {
    stream: DuplexStream,
    buf: BytesMut,
}

impl MockServer {
    pub(crate) fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
        }
    }

    /// Next complete operation written by the client.
    pub(crate) async fn next_op(&mut self) -> ClientOp {
        loop {
            if let Some(op) = codec::decode_op_from(&mut self.buf).unwrap() {
                return op;
            }
            let n = self.stream.read_buf(&mut self.buf).await.unwrap();
            assert!(n > 0, "client closed the stream mid-operation");
        }
    }

    pub(crate) async fn send(&mut self, frame: Frame) {
        let mut out = BytesMut::new();
        codec::encode_frame(&frame, &mut out).unwrap();
        self.send_raw(&out).await;
    }

    pub(crate) async fn send_raw(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
    }

    /// Answer one flush, which also proves every earlier frame was dispatched.
    pub(crate) async fn round_trip_flush(&mut self, conn: &Connection) {
        let flush = tokio::spawn({
            let conn = conn.clone();
            async move { conn.flush().await }
        });
        assert_eq!(self.next_op().await, ClientOp::Ping);
        self.send(Frame::Pong).await;
        flush.await.unwrap().unwrap();
    }

    /// Read to EOF; true if nothing but EOF was left.
    pub(crate) async fn at_eof(&mut self) -> bool {
        while self.stream.read_buf(&mut self.buf).await.unwrap() > 0 {}
        self.buf.is_empty()
    }
}

pub(crate) async fn connect_mock() -> (Connection, MockServer) {
    connect_mock_with(ClientConfig::default(), Arc::new(TracingSink)).await
}

/// Start a connection over a duplex pipe and consume its `CONNECT`.
pub(crate) async fn connect_mock_with(
    config: ClientConfig,
    sink: Arc<dyn DiagnosticsSink>,
) -> (Connection, MockServer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let conn = ConnectionBuilder::new(config)
        .diagnostics(sink)
        .start(client)
        .await
        .unwrap();

    let mut server = MockServer::new(server);
    assert!(matches!(server.next_op().await, ClientOp::Connect(_)));
    (conn, server)
}

/// Poll until the connection reaches `state`, failing after a second.
pub(crate) async fn wait_for_state(conn: &Connection, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while conn.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("connection stuck in {}, expected {}", conn.state(), state));
}

/// Client end of a duplex pipe whose writes fail with `BrokenPipe` once the
/// returned flag is set.
pub(crate) struct FailingStream {
    inner: DuplexStream,
    fail_writes: Arc<AtomicBool>,
}

impl FailingStream {
    pub(crate) fn new(inner: DuplexStream) -> (Self, Arc<AtomicBool>) {
        let fail_writes = Arc::new(AtomicBool::new(false));
        let stream = Self {
            inner,
            fail_writes: Arc::clone(&fail_writes),
        };
        (stream, fail_writes)
    }

    fn failing(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

impl AsyncRead for FailingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FailingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.failing() {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.failing() {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
