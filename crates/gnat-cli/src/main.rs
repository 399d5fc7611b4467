//! # gnat
//!
//! Demo client: connects to a server, subscribes to the configured subjects,
//! and publishes to them on an interval until Ctrl-C.
//!
//! ## Usage
//!
//! ```bash
//! # Run against a local server on the default port
//! gnat
//!
//! # Point at another server
//! GNAT_SERVER=10.0.0.2:4222 gnat
//!
//! # More logging
//! RUST_LOG=gnat=trace,gnat_client=trace gnat
//! ```

mod config;
mod metrics;
mod run;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gnat=debug,gnat_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    tracing::info!("Starting gnat demo against {}", config.server);

    if config.metrics.enabled {
        metrics::start_exporter(config.metrics.port)?;
    }

    run::run(config).await
}
