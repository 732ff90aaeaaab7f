//! Serial transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serial connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. "/dev/ttyUSB0", "COM10").
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Inbound line delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Log every decoded reading.
    #[serde(default)]
    pub debug: bool,
    /// Read timeout in milliseconds. Bounds how long the reader takes to notice close().
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Maximum bytes buffered for one line before it is discarded.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_delimiter() -> String {
    "\n".to_string()
}

fn default_read_timeout_ms() -> u64 {
    100
}

fn default_max_line_bytes() -> usize {
    4096
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            delimiter: default_delimiter(),
            debug: false,
            read_timeout_ms: default_read_timeout_ms(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
