//! Demo loop.

use crate::config::Config;
use anyhow::{Context, Result};
use bytes::Bytes;
use gnat_client::{ClientError, Connection};
use gnat_transport::TcpDialer;
use tracing::{info, warn};

/// Connect, subscribe, and publish every interval until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the connection cannot be established or breaks.
pub async fn run(config: Config) -> Result<()> {
    let dialer = TcpDialer::default();
    let conn = Connection::connect(&dialer, &config.server, config.client.clone())
        .await
        .with_context(|| format!("Failed to connect to {}", config.server))?;

    for subject in &config.subjects {
        let sid = conn
            .subscribe(
                subject,
                config.queue.as_deref(),
                |subject: &str, reply_to: Option<&str>, payload: &Bytes| {
                    info!(
                        subject = %subject,
                        reply_to = ?reply_to,
                        payload = %String::from_utf8_lossy(payload),
                        "Received"
                    );
                },
            )
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;
        info!(sid, subject = %subject, "Subscribed");
    }

    let mut round: u64 = 0;
    loop {
        round += 1;
        for subject in &config.subjects {
            let payload = format!("message {} on {}", round, subject);
            conn.publish(subject, None, payload).await?;
        }

        match conn.flush().await {
            Ok(()) => {}
            Err(e @ ClientError::FlushTimeout(_)) => warn!("{}", e),
            Err(e) => return Err(e).context("Connection lost"),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(config.interval()) => {}
        }
    }

    info!(
        rounds = round,
        subscriptions = conn.subscription_count(),
        "Shutting down"
    );
    conn.close().await?;
    Ok(())
}
