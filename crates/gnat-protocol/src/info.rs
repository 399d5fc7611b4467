//! JSON documents carried by `INFO` and `CONNECT`.

use serde::{Deserialize, Serialize};

/// Language tag advertised in `CONNECT`.
pub const CLIENT_LANG: &str = "rust";

/// Client version advertised in `CONNECT`.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server information from an `INFO` line.
///
/// Only a handful of fields matter to the client. Everything is optional and
/// unknown fields are ignored so newer servers never break decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Unique server identifier.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_id: String,
    /// Human readable server name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    /// Server version string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Maximum payload the server accepts, in bytes.
    pub max_payload: u64,
    /// Alternate URLs of cluster peers. Stored, never acted upon.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connect_urls: Vec<String>,
}

impl ServerInfo {
    /// Parse the JSON argument of an `INFO` line.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Options sent in the `CONNECT` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Ask the server to acknowledge every operation with `+OK`.
    pub verbose: bool,
    /// Ask the server to perform strict subject checking.
    pub pedantic: bool,
    /// Optional client name shown in server monitoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Client implementation language.
    pub lang: String,
    /// Client implementation version.
    pub version: String,
}

impl ConnectOptions {
    /// Create options with the given client name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            pedantic: false,
            name: None,
            lang: CLIENT_LANG.to_string(),
            version: CLIENT_VERSION.to_string(),
        }
    }
}
