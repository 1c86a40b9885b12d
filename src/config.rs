//! Poller configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`Poller`](crate::poller::Poller)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Base address artifact names are resolved against
    pub base_url: String,

    /// Seconds between refresh cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Response header carrying the resource's last-modified timestamp
    #[serde(default = "default_modified_header")]
    pub modified_header: String,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_modified_header() -> String {
    "Modified-At".to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            interval_secs: default_interval_secs(),
            modified_header: default_modified_header(),
        }
    }
}

impl PollerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }
}
