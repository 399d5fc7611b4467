//! Startup handshake.

use gnat_protocol::{codec, ClientOp, ConnectOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::ClientError;

/// Write the `CONNECT` line. Runs once, before the read loop starts.
pub(crate) async fn send_connect<W>(
    writer: &mut W,
    options: &ConnectOptions,
) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let line = codec::encode(&ClientOp::Connect(options.clone()))?;
    writer.write_all(&line).await?;
    writer.flush().await?;

    debug!(name = ?options.name, verbose = options.verbose, "Sent CONNECT");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_connect() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        send_connect(&mut client, &ConnectOptions::named("gopher"))
            .await
            .unwrap();
        drop(client);

        let mut buf = BytesMut::new();
        while server.read_buf(&mut buf).await.unwrap() > 0 {}

        match codec::decode_op_from(&mut buf).unwrap() {
            Some(ClientOp::Connect(options)) => {
                assert_eq!(options.name.as_deref(), Some("gopher"));
                assert!(!options.verbose);
            }
            other => panic!("Expected CONNECT, got {:?}", other),
        }
        assert!(buf.is_empty());
    }
}
