//! Background reader.
//!
//! One task per connection decodes server frames in arrival order and acts on
//! each before reading the next: messages go to their handler, `PING` is
//! answered, acknowledgments release the flush gate. The task ends on EOF, on a
//! malformed frame, or when the connection is closed locally.

use bytes::BytesMut;
use gnat_protocol::{codec, ClientOp, Frame};
use gnat_transport::{BoxedStream, TransportError};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tracing::{debug, error, warn, Level};

use crate::connection::Shared;
use crate::error::ClientError;
use crate::metrics;

/// Start the read loop for a connection.
pub(crate) fn spawn(reader: ReadHalf<BoxedStream>, shared: Arc<Shared>) {
    tokio::spawn(async move {
        match run(reader, &shared).await {
            Ok(()) => debug!(connection = %shared.id, "Read loop stopped"),
            Err(e) => {
                if shared.state.mark_broken() {
                    error!(connection = %shared.id, error = %e, "Read loop failed, connection is broken");
                } else {
                    debug!(
                        connection = %shared.id,
                        state = %shared.state.get(),
                        error = %e,
                        "Read loop ended"
                    );
                }
            }
        }
        shared.terminated.send_replace(true);
    });
}

async fn run(mut reader: ReadHalf<BoxedStream>, shared: &Shared) -> Result<(), ClientError> {
    let mut buf = BytesMut::with_capacity(shared.config.read_buffer_size);

    loop {
        while let Some(frame) = codec::decode_from(&mut buf)? {
            dispatch(shared, frame).await;
        }

        tokio::select! {
            biased;

            _ = shared.shutdown.notified() => return Ok(()),

            read = reader.read_buf(&mut buf) => {
                if read? == 0 {
                    return Err(eof_error(&buf));
                }
            }
        }
    }
}

/// EOF between frames is a plain close; EOF inside one is a truncated frame.
fn eof_error(buf: &BytesMut) -> ClientError {
    if buf.is_empty() {
        return TransportError::ConnectionClosed.into();
    }
    match codec::decode(buf) {
        Err(e) => e.into(),
        Ok(_) => TransportError::ConnectionClosed.into(),
    }
}

async fn dispatch(shared: &Shared, frame: Frame) {
    let kind = frame.kind();

    match frame {
        Frame::Msg {
            subject,
            reply_to,
            sid,
            payload,
        } => {
            metrics::record_message(payload.len(), "inbound");
            shared.diagnostics.record(
                Level::TRACE,
                kind,
                format_args!("sid={} subject={} bytes={}", sid, subject, payload.len()),
            );

            match shared.registry.lookup(sid) {
                Some(subscription) => {
                    subscription.deliver(&subject, reply_to.as_deref(), &payload);
                }
                None => {
                    metrics::record_dropped();
                    debug!(connection = %shared.id, sid, subject = %subject, "No subscription, dropping message");
                }
            }
        }
        Frame::Ping => {
            shared.diagnostics.record(Level::TRACE, kind, format_args!("keep-alive"));
            if let Err(e) = shared.send_op(&ClientOp::Pong).await {
                warn!(connection = %shared.id, error = %e, "Failed to answer PING");
            }
        }
        Frame::Pong | Frame::Ok => {
            let delivered = shared.gate.release();
            shared.diagnostics.record(
                Level::TRACE,
                kind,
                format_args!("acknowledged, delivered={}", delivered),
            );
        }
        Frame::Info(info) => {
            shared.diagnostics.record(
                Level::INFO,
                kind,
                format_args!(
                    "server_id={} version={} max_payload={}",
                    info.server_id, info.version, info.max_payload
                ),
            );
            shared.server_info.send_replace(Some(info));
        }
        Frame::Err(text) => {
            metrics::record_server_error();
            shared
                .diagnostics
                .record(Level::WARN, kind, format_args!("server error: {}", text));
        }
        Frame::Unknown(op) => {
            shared
                .diagnostics
                .record(Level::DEBUG, kind, format_args!("ignoring {}", op));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ClientError;
    use crate::state::ConnectionState;
    use crate::test_support::{connect_mock, wait_for_state};
    use bytes::Bytes;
    use gnat_protocol::{ClientOp, ProtocolError};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_eof_marks_connection_broken() {
        let (conn, server) = connect_mock().await;
        drop(server);

        wait_for_state(&conn, ConnectionState::Broken).await;
        assert!(matches!(
            conn.publish("foo", None, Bytes::new()).await,
            Err(ClientError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.unsubscribe(1).await,
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_malformed_msg_marks_connection_broken() {
        let (conn, mut server) = connect_mock().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        conn.subscribe("foo", None, move |_: &str, _: Option<&str>, p: &Bytes| {
            let _ = tx.send(p.clone());
        })
        .await
        .unwrap();

        server.send_raw(b"MSG foo 1 3\r\nabc\r\nMSG foo one 3\r\nabc\r\n").await;

        assert_eq!(&rx.recv().await.unwrap()[..], b"abc");
        wait_for_state(&conn, ConnectionState::Broken).await;
        assert!(matches!(conn.flush().await, Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_truncated_frame_at_eof() {
        let (conn, mut server) = connect_mock().await;

        server.send_raw(b"MSG foo 1 10\r\nabc").await;
        drop(server);

        wait_for_state(&conn, ConnectionState::Broken).await;
    }

    #[test]
    fn test_eof_error_classification() {
        let empty = bytes::BytesMut::new();
        assert!(matches!(
            super::eof_error(&empty),
            ClientError::Transport(gnat_transport::TransportError::ConnectionClosed)
        ));

        let partial = bytes::BytesMut::from(&b"MSG foo 1 10\r\nabc"[..]);
        assert!(matches!(
            super::eof_error(&partial),
            ClientError::Protocol(ProtocolError::Incomplete(_))
        ));
    }

    #[tokio::test]
    async fn test_frames_split_across_reads() {
        let (conn, mut server) = connect_mock().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sid = conn
            .subscribe("foo", None, move |s: &str, _: Option<&str>, p: &Bytes| {
                let _ = tx.send((s.to_string(), p.clone()));
            })
            .await
            .unwrap();
        assert!(matches!(server.next_op().await, ClientOp::Sub { .. }));

        let wire = format!("MSG foo {} 11\r\nhello world\r\nPING\r\n", sid);
        for chunk in wire.as_bytes().chunks(3) {
            server.send_raw(chunk).await;
            tokio::task::yield_now().await;
        }

        let (subject, payload) = rx.recv().await.unwrap();
        assert_eq!(subject, "foo");
        assert_eq!(&payload[..], b"hello world");
        assert_eq!(server.next_op().await, ClientOp::Pong);
        assert_eq!(conn.state(), ConnectionState::Open);
    }
}
