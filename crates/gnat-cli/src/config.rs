//! Demo configuration.
//!
//! Loaded from the first of `gnat.toml`, `/etc/gnat/gnat.toml` and
//! `~/.config/gnat/gnat.toml` that exists, otherwise defaults. `GNAT_SERVER`
//! overrides the default server address.

use anyhow::{Context, Result};
use gnat_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Demo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server address, `host:port`.
    #[serde(default = "default_server")]
    pub server: String,

    /// Subjects to subscribe and publish to.
    #[serde(default = "default_subjects")]
    pub subjects: Vec<String>,

    /// Queue group for the subscriptions, if any.
    #[serde(default)]
    pub queue: Option<String>,

    /// Delay between publish rounds in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Connection settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_server() -> String {
    std::env::var("GNAT_SERVER").unwrap_or_else(|_| "127.0.0.1:4222".to_string())
}

fn default_subjects() -> Vec<String> {
    vec!["foo".to_string(), "hello".to_string()]
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            subjects: default_subjects(),
            queue: None,
            interval_ms: default_interval_ms(),
            client: ClientConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "gnat.toml",
            "/etc/gnat/gnat.toml",
            "~/.config/gnat/gnat.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Delay between publish rounds.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
