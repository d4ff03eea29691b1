//! Client configuration.

use crate::client::DEFAULT_BATCH_SIZE;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Connection settings for the appliance, loadable from a JSON file.
///
/// ```json
/// {
///   "host": "search.example.net",
///   "port": 4970,
///   "api_key": "abcd1234",
///   "batch_size": 1024
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Appliance host name or IP address.
    pub host: String,
    /// Appliance port.
    pub port: u16,
    /// Access key issued by the operator (8 significant bytes).
    pub api_key: String,
    /// Client-side query batch size.
    pub batch_size: usize,
    /// Connect timeout in seconds; 0 blocks indefinitely.
    pub connect_timeout_secs: u64,
    /// Socket read/write timeout in seconds; 0 blocks indefinitely.
    pub io_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4970,
            api_key: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            connect_timeout_secs: 10,
            io_timeout_secs: 0,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Connect timeout, or `None` to block indefinitely.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    /// Socket read/write timeout, or `None` to block indefinitely.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.io_timeout_secs > 0).then(|| Duration::from_secs(self.io_timeout_secs))
    }
}
