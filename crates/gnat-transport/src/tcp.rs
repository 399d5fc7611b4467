//! TCP transport implementation.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::traits::{BoxedStream, Dialer, TransportError};

/// TCP dialer configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Maximum time to wait for the TCP handshake.
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm; control lines are small and latency bound.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            nodelay: true,
        }
    }
}

/// Opens plain TCP connections.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    config: TcpConfig,
}

impl TcpDialer {
    /// Create a dialer with the given configuration.
    #[must_use]
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    /// Get the dialer configuration.
    #[must_use]
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: &str) -> Result<BoxedStream, TransportError> {
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(addr.to_string()))?
            .map_err(|source| TransportError::DialFailed {
                addr: addr.to_string(),
                source,
            })?;

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        debug!(addr = %addr, "TCP connection established");
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_config_default() {
        let config = TcpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(config.nodelay);
    }

    #[tokio::test]
    async fn test_tcp_dial_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"INFO {}\r\n").await.unwrap();
            let mut buf = [0u8; 6];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let dialer = TcpDialer::default();
        assert_eq!(dialer.name(), "tcp");
        let mut stream = dialer.dial(&addr).await.unwrap();

        let mut buf = [0u8; 9];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"INFO {}\r\n");

        stream.write_all(b"PING\r\n").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"PING\r\n");
    }

    #[tokio::test]
    async fn test_tcp_dial_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        match TcpDialer::default().dial(&addr).await {
            Err(TransportError::DialFailed { addr: failed, .. }) => assert_eq!(failed, addr),
            Err(other) => panic!("Expected DialFailed, got {:?}", other),
            Ok(_) => panic!("Dial to a closed port succeeded"),
        }
    }
}
