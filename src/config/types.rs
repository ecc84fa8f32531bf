//! Configuration section types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clipboard::BridgeOptions;

/// Clipboard access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardConfig {
    /// Extra OleGetClipboard attempts while another process has the
    /// clipboard open. Default: 0 (fail immediately).
    #[serde(default)]
    pub open_retries: u32,

    /// Milliseconds between open attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Flush the clipboard before the CLI exits so contents outlive it
    #[serde(default)]
    pub flush_on_exit: bool,
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            open_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            flush_on_exit: false,
        }
    }
}

impl From<&ClipboardConfig> for BridgeOptions {
    fn from(config: &ClipboardConfig) -> Self {
        Self {
            open_retries: config.open_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Clipboard watch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Milliseconds between clipboard polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Formats to probe, in priority order. Standard names ("Bitmap",
    /// "UnicodeText") or registered format names.
    #[serde(default = "default_watch_formats")]
    pub formats: Vec<String>,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_watch_formats() -> Vec<String> {
    vec![
        "Bitmap".to_string(),
        "UnicodeText".to_string(),
        "Text".to_string(),
    ]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            formats: default_watch_formats(),
        }
    }
}

impl WatchConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
